use log::debug;
use std::collections::VecDeque;

use crate::{
    config::PipelineConfig,
    signal::{BeatEvent, FilteredSample},
};

/// Tunables of the streaming R-peak detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorConfig {
    /// Samples kept in the detection window (at least 3).
    pub window_samples: usize,
    /// Minimum filtered amplitude of an R-peak (mV).
    pub threshold: f64,
    /// Minimum distance between accepted beats, in samples.
    pub refractory_samples: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::from_pipeline(&PipelineConfig::default())
    }
}

impl DetectorConfig {
    pub fn from_pipeline(cfg: &PipelineConfig) -> Self {
        Self {
            window_samples: cfg.detection_window_samples().max(3),
            threshold: cfg.detection_threshold_mv,
            refractory_samples: cfg.refractory_samples(),
        }
    }
}

/// Simplified Pan–Tompkins local-maximum detector over an unbounded stream.
///
/// A sample is judged exactly once, when its right-hand neighbour arrives:
/// it must exceed the threshold and both neighbours strictly, and lie at
/// least the refractory distance after the previous beat. Detection latency
/// is therefore one sample.
#[derive(Debug, Clone)]
pub struct BeatDetector {
    cfg: DetectorConfig,
    window: VecDeque<(u64, FilteredSample)>,
    next_index: u64,
    last_beat: Option<u64>,
    beats: u64,
}

impl BeatDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        let cfg = DetectorConfig {
            window_samples: cfg.window_samples.max(3),
            ..cfg
        };
        Self {
            window: VecDeque::new(),
            cfg,
            next_index: 0,
            last_beat: None,
            beats: 0,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Feed the next filtered sample; returns a beat if the previous sample
    /// turned out to be an R-peak.
    pub fn observe(&mut self, sample: FilteredSample) -> Option<BeatEvent> {
        if self.window.len() == self.cfg.window_samples {
            self.window.pop_front();
        }
        self.window.push_back((self.next_index, sample));
        self.next_index += 1;

        let n = self.window.len();
        if n < 3 {
            return None;
        }
        let (_, left) = self.window[n - 3];
        let (index, mid) = self.window[n - 2];
        let (_, right) = self.window[n - 1];

        let is_peak =
            mid.value > self.cfg.threshold && mid.value > left.value && mid.value > right.value;
        if !is_peak {
            return None;
        }
        if let Some(last) = self.last_beat {
            if index - last < self.cfg.refractory_samples as u64 {
                debug!(
                    "candidate at sample {index} within refractory period of beat at {last}"
                );
                return None;
            }
        }

        self.last_beat = Some(index);
        self.beats += 1;
        Some(BeatEvent {
            sample_index: index,
            timestamp_ms: mid.timestamp_ms,
            amplitude: mid.value,
        })
    }

    /// Filtered samples currently held, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &FilteredSample> {
        self.window.iter().map(|(_, s)| s)
    }

    pub fn samples_seen(&self) -> u64 {
        self.next_index
    }

    pub fn beats_detected(&self) -> u64 {
        self.beats
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.next_index = 0;
        self.last_beat = None;
        self.beats = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const FS: f64 = 250.0;

    fn sample(i: usize, value: f64) -> FilteredSample {
        FilteredSample {
            timestamp_ms: i as f64 * 1000.0 / FS,
            value,
        }
    }

    fn run(detector: &mut BeatDetector, data: &[f64]) -> Vec<BeatEvent> {
        data.iter()
            .enumerate()
            .filter_map(|(i, &v)| detector.observe(sample(i, v)))
            .collect()
    }

    /// Gaussian pseudo-QRS pulses centred on the given sample indices.
    fn pulse_train(len: usize, centres: &[usize], amp: f64) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let t = i as f64 / FS;
                let mut v = 0.05 * (2.0 * PI * t).sin();
                for &c in centres {
                    let d = (i as f64 - c as f64) / 5.0;
                    v += amp * (-0.5 * d * d).exp();
                }
                v
            })
            .collect()
    }

    #[test]
    fn detects_600ms_train_within_one_sample() {
        let centres: Vec<usize> = (0..12).map(|k| 100 + k * 150).collect();
        let data = pulse_train(2000, &centres, 1.2);
        let mut det = BeatDetector::new(DetectorConfig::default());
        let beats = run(&mut det, &data);

        assert_eq!(beats.len(), centres.len());
        let one_sample = 1000.0 / FS;
        for w in beats.windows(2) {
            let rr = w[1].timestamp_ms - w[0].timestamp_ms;
            assert!((rr - 600.0).abs() <= one_sample, "rr {rr} ms");
            assert!(rr >= 200.0);
        }
        assert_eq!(det.beats_detected(), 12);
    }

    #[test]
    fn refractory_suppresses_double_peaks() {
        // second hump 30 samples (120 ms) after the first
        let data = pulse_train(400, &[100, 130, 250], 1.0);
        let mut det = BeatDetector::new(DetectorConfig::default());
        let beats = run(&mut det, &data);
        let idx: Vec<u64> = beats.iter().map(|b| b.sample_index).collect();
        assert_eq!(idx, vec![100, 250]);
    }

    #[test]
    fn accepts_beat_exactly_at_refractory_distance() {
        let cfg = DetectorConfig {
            window_samples: 10,
            threshold: 0.5,
            refractory_samples: 4,
        };
        let mut det = BeatDetector::new(cfg);
        let data = [0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0];
        let idx: Vec<u64> = run(&mut det, &data).iter().map(|b| b.sample_index).collect();
        assert_eq!(idx, vec![1, 5]);
    }

    #[test]
    fn ignores_sub_threshold_and_flat_tops() {
        let mut det = BeatDetector::new(DetectorConfig::default());
        assert!(run(&mut det, &[0.0, 0.6, 0.0, 0.9, 0.9, 0.0]).is_empty());
    }

    #[test]
    fn window_edges_are_judged_once_interior() {
        let mut det = BeatDetector::new(DetectorConfig::default());
        // leading sample has no left neighbour
        assert!(det.observe(sample(0, 2.0)).is_none());
        assert!(det.observe(sample(1, 0.1)).is_none());
        // newest sample waits for its right neighbour
        assert!(det.observe(sample(2, 1.5)).is_none());
        let beat = det.observe(sample(3, 0.2)).expect("peak once interior");
        assert_eq!(beat.sample_index, 2);
        assert_eq!(beat.amplitude, 1.5);
    }

    #[test]
    fn memory_is_bounded_by_window() {
        let cfg = DetectorConfig {
            window_samples: 5,
            ..DetectorConfig::default()
        };
        let mut det = BeatDetector::new(cfg);
        for i in 0..100 {
            det.observe(sample(i, 0.0));
        }
        assert_eq!(det.window().count(), 5);
        assert_eq!(det.samples_seen(), 100);
    }
}
