use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    buffer::SampleBuffer,
    config::PipelineConfig,
    detectors::{BeatDetector, DetectorConfig},
    error::{EcgError, Result},
    filters::FilterChain,
    metrics::{Metrics, MetricsEngine, RhythmAssessment, RhythmClassifier},
    signal::{BeatEvent, FilteredSample, Sample},
};

/// Counters of what happened to ingested samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    pub accepted: u64,
    pub out_of_order: u64,
    pub malformed: u64,
    pub filter_faults: u64,
    pub beats: u64,
}

/// Read-only view handed to the presentation layer after each sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub metrics: Metrics,
    /// `None` until a heart rate is available.
    pub assessment: Option<RhythmAssessment>,
    pub last_beat: Option<BeatEvent>,
    pub stats: PipelineStats,
}

/// One monitoring session: filter → buffer/detector → metrics → classifier.
///
/// Each `ingest` call runs every stage to completion before returning. An
/// instance owns all of its state; run one per patient stream.
#[derive(Debug)]
pub struct EcgPipeline {
    cfg: PipelineConfig,
    filters: FilterChain,
    buffer: SampleBuffer<FilteredSample>,
    detector: BeatDetector,
    metrics: MetricsEngine,
    classifier: RhythmClassifier,
    assessment: Option<RhythmAssessment>,
    last_beat: Option<BeatEvent>,
    stats: PipelineStats,
}

impl EcgPipeline {
    pub fn new(cfg: PipelineConfig) -> Result<Self> {
        let filters = FilterChain::from_config(cfg.sampling_rate_hz, &cfg.filter);
        Self::with_filter_chain(cfg, filters)
    }

    /// Build a session around a custom filter cascade.
    pub fn with_filter_chain(cfg: PipelineConfig, filters: FilterChain) -> Result<Self> {
        cfg.validate()?;
        info!(
            "ecg session: fs={} Hz, refractory={} samples, rr window={}, filters={:?}",
            cfg.sampling_rate_hz,
            cfg.refractory_samples(),
            cfg.rr_window,
            filters.stage_names()
        );
        Ok(Self {
            buffer: SampleBuffer::new(cfg.buffer_capacity),
            detector: BeatDetector::new(DetectorConfig::from_pipeline(&cfg)),
            metrics: MetricsEngine::new(cfg.rr_window),
            classifier: RhythmClassifier::new(cfg.thresholds),
            filters,
            cfg,
            assessment: None,
            last_beat: None,
            stats: PipelineStats::default(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn ingest(&mut self, timestamp_ms: f64, amplitude: f64) -> Result<Option<BeatEvent>> {
        self.ingest_sample(Sample::new(timestamp_ms, amplitude))
    }

    /// Process one sample. Dropped samples return an error but leave the
    /// session untouched and usable.
    pub fn ingest_sample(&mut self, sample: Sample) -> Result<Option<BeatEvent>> {
        if !sample.is_finite() {
            self.stats.malformed += 1;
            warn!("dropping malformed sample at {} ms", sample.timestamp_ms);
            return Err(EcgError::MalformedSample {
                timestamp_ms: sample.timestamp_ms,
            });
        }
        if let Err(err) = self.buffer.check(sample.timestamp_ms) {
            self.stats.out_of_order += 1;
            debug!("dropping sample: {err}");
            return Err(err);
        }

        let value = self.filters.process(sample.amplitude);
        self.stats.filter_faults = self.filters.faults();
        let filtered = FilteredSample {
            timestamp_ms: sample.timestamp_ms,
            value,
        };
        self.buffer.push(filtered)?;
        self.stats.accepted += 1;

        let Some(beat) = self.detector.observe(filtered) else {
            return Ok(None);
        };
        let metrics = self.metrics.on_beat(&beat);
        self.assessment = metrics
            .is_available()
            .then(|| self.classifier.classify(&metrics));
        self.last_beat = Some(beat);
        self.stats.beats += 1;
        debug!(
            "beat #{} at {:.0} ms, hr={:?}",
            self.stats.beats, beat.timestamp_ms, metrics.heart_rate_bpm
        );
        Ok(Some(beat))
    }

    /// Feed a batch in order; rejected samples are counted and skipped.
    pub fn ingest_batch<I>(&mut self, samples: I) -> Vec<BeatEvent>
    where
        I: IntoIterator<Item = Sample>,
    {
        samples
            .into_iter()
            .filter_map(|s| self.ingest_sample(s).ok().flatten())
            .collect()
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.metrics()
    }

    pub fn assessment(&self) -> Option<&RhythmAssessment> {
        self.assessment.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            metrics: self.metrics(),
            assessment: self.assessment.clone(),
            last_beat: self.last_beat,
            stats: self.stats,
        }
    }

    /// Filtered display window, oldest first.
    pub fn window(&self) -> Vec<FilteredSample> {
        self.buffer.snapshot()
    }

    pub fn rr_intervals(&self) -> Vec<f64> {
        self.metrics.intervals()
    }

    /// Return the session to its freshly-constructed state.
    pub fn reset(&mut self) {
        self.filters.reset();
        self.buffer.clear();
        self.detector.reset();
        self.metrics.reset();
        self.assessment = None;
        self.last_beat = None;
        self.stats = PipelineStats::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        filters::FilterStage,
        metrics::{RhythmFlag, RhythmSummary},
    };
    use std::f64::consts::PI;

    const FS: f64 = 250.0;

    /// Raw single-lead trace: QRS pulses every `rr_ms`, DC offset, wander and 50 Hz hum.
    fn raw_trace(seconds: f64, rr_ms: f64) -> Vec<Sample> {
        let n = (seconds * FS) as usize;
        let first = 0.3;
        (0..n)
            .map(|i| {
                let t = i as f64 / FS;
                let mut v = 0.3 + 0.2 * (2.0 * PI * 0.15 * t).sin()
                    + 0.1 * (2.0 * PI * 50.0 * t).sin();
                let k = ((t - first) / (rr_ms / 1000.0)).round().max(0.0);
                let centre = first + k * rr_ms / 1000.0;
                let d = (t - centre) / 0.02;
                v += 1.5 * (-0.5 * d * d).exp();
                Sample::new(t * 1000.0, v)
            })
            .collect()
    }

    #[test]
    fn tachycardic_trace_end_to_end() {
        let mut pipeline = EcgPipeline::new(PipelineConfig::default()).unwrap();
        let beats = pipeline.ingest_batch(raw_trace(20.0, 500.0));

        assert!(beats.len() >= 38, "only {} beats", beats.len());
        for w in beats.windows(2) {
            let rr = w[1].timestamp_ms - w[0].timestamp_ms;
            assert!((rr - 500.0).abs() <= 8.0, "rr {rr}");
        }
        let snap = pipeline.snapshot();
        let hr = snap.metrics.heart_rate().unwrap();
        assert!((119..=121).contains(&hr), "hr {hr}");
        assert!(snap.metrics.hrv_ms < 10.0);
        let assessment = snap.assessment.unwrap();
        assert_eq!(assessment.flags, vec![RhythmFlag::Tachycardia]);
        assert_eq!(assessment.summary, RhythmSummary::Tachycardia);
        assert_eq!(snap.stats.accepted, 5000);
        assert_eq!(snap.stats.beats as usize, beats.len());
    }

    #[test]
    fn duplicates_and_stale_samples_are_dropped() {
        let trace = raw_trace(10.0, 800.0);
        let mut clean = EcgPipeline::new(PipelineConfig::default()).unwrap();
        clean.ingest_batch(trace.clone());

        let mut noisy = EcgPipeline::new(PipelineConfig::default()).unwrap();
        let mut injected = 0;
        for (i, s) in trace.iter().enumerate() {
            noisy.ingest_sample(*s).ok();
            if i % 7 == 0 {
                assert!(matches!(
                    noisy.ingest_sample(*s),
                    Err(EcgError::OutOfOrderSample { .. })
                ));
                injected += 1;
            }
            if i % 11 == 0 && i > 20 {
                assert!(noisy.ingest_sample(trace[i - 20]).is_err());
                injected += 1;
            }
        }

        assert_eq!(noisy.stats().out_of_order, injected);
        assert_eq!(noisy.metrics(), clean.metrics());
        assert!(noisy.rr_intervals().iter().all(|rr| *rr > 0.0));
        let window = noisy.window();
        assert!(window
            .windows(2)
            .all(|w| w[1].timestamp_ms > w[0].timestamp_ms));
        assert_eq!(noisy.metrics().heart_rate_bpm, Some(75));
    }

    #[test]
    fn rr_follows_timestamps_across_dropped_samples() {
        let cfg = PipelineConfig::default();
        // 20 ms lost every 200 ms, plus a 40 ms burst between beats;
        // gap lengths are whole mains periods so the hum stays in phase
        let trace: Vec<Sample> = raw_trace(10.0, 800.0)
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !(40..45).contains(&(i % 50)) && !(1000..1010).contains(i))
            .map(|(_, s)| s)
            .collect();
        let sent = trace.len() as u64;
        assert_eq!(sent, 2240);

        let mut pipeline = EcgPipeline::new(cfg).unwrap();
        let beats = pipeline.ingest_batch(trace);

        assert!(beats.len() >= 12, "only {} beats", beats.len());
        for w in beats.windows(2) {
            let rr = w[1].timestamp_ms - w[0].timestamp_ms;
            assert!((rr - 800.0).abs() <= 8.0, "rr {rr}");
            assert!(rr >= cfg.refractory_ms);
            // fewer samples than 800 ms worth, yet RR is still 800 ms
            assert!(w[1].sample_index - w[0].sample_index < 200);
        }
        assert!(pipeline
            .rr_intervals()
            .iter()
            .all(|rr| (rr - 800.0).abs() <= 8.0));
        assert_eq!(pipeline.metrics().heart_rate_bpm, Some(75));
        assert_eq!(pipeline.stats().accepted, sent);
        assert_eq!(pipeline.stats().out_of_order, 0);
    }

    #[test]
    fn malformed_samples_do_not_stop_the_session() {
        let mut pipeline = EcgPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.ingest(0.0, 0.1).unwrap();
        assert_eq!(
            pipeline.ingest(4.0, f64::NAN),
            Err(EcgError::MalformedSample { timestamp_ms: 4.0 })
        );
        assert!(pipeline.ingest(f64::INFINITY, 0.1).is_err());
        pipeline.ingest(4.0, 0.2).unwrap();
        assert_eq!(pipeline.stats().malformed, 2);
        assert_eq!(pipeline.stats().accepted, 2);
    }

    struct Saturating;

    impl FilterStage for Saturating {
        fn name(&self) -> &'static str {
            "saturating"
        }

        fn process(&mut self, input: f64) -> Result<f64> {
            crate::filters::checked(self.name(), input, input * 1e308 * 10.0)
        }

        fn reset(&mut self) {}
    }

    #[test]
    fn filter_fault_falls_back_to_raw_signal() {
        let chain = FilterChain::new(vec![Box::new(Saturating)]);
        let mut pipeline =
            EcgPipeline::with_filter_chain(PipelineConfig::default(), chain).unwrap();
        let data = [0.0, 0.0, 1.0, 0.0, 0.0];
        let beats: Vec<_> = data
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| pipeline.ingest(i as f64 * 4.0, v).unwrap())
            .collect();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].amplitude, 1.0);
        // zero input stays finite, the spike overflows
        assert_eq!(pipeline.stats().filter_faults, 1);
    }

    #[test]
    fn display_window_is_bounded() {
        let cfg = PipelineConfig {
            buffer_capacity: 100,
            ..Default::default()
        };
        let mut pipeline = EcgPipeline::new(cfg).unwrap();
        pipeline.ingest_batch(raw_trace(2.0, 800.0));
        let window = pipeline.window();
        assert_eq!(window.len(), 100);
        assert_eq!(window.last().map(|s| s.timestamp_ms), Some(1996.0));
    }

    #[test]
    fn metrics_unavailable_before_second_beat() {
        let mut pipeline = EcgPipeline::new(PipelineConfig::default()).unwrap();
        pipeline.ingest_batch(raw_trace(0.6, 800.0));
        let snap = pipeline.snapshot();
        assert_eq!(snap.stats.beats, 1);
        assert!(snap.assessment.is_none());
        assert!(matches!(
            snap.metrics.heart_rate(),
            Err(EcgError::InsufficientData { beats: 1 })
        ));
    }

    #[test]
    fn sessions_are_independent() {
        fn assert_send<T: Send>() {}
        assert_send::<EcgPipeline>();

        let mut a = EcgPipeline::new(PipelineConfig::default()).unwrap();
        let mut b = EcgPipeline::new(PipelineConfig::default()).unwrap();
        a.ingest_batch(raw_trace(6.0, 500.0));
        assert_eq!(b.stats(), PipelineStats::default());
        b.ingest_batch(raw_trace(6.0, 1200.0));
        assert_eq!(a.metrics().heart_rate_bpm, Some(120));
        assert_eq!(b.metrics().heart_rate_bpm, Some(50));

        a.reset();
        assert_eq!(a.snapshot().stats, PipelineStats::default());
        assert!(a.window().is_empty());
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = PipelineConfig {
            buffer_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            EcgPipeline::new(cfg),
            Err(EcgError::InvalidConfig(_))
        ));
    }
}
