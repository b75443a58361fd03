use anyhow::Result;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{f64::consts::PI, thread::JoinHandle, time::Duration};

use crate::signal::Sample;

/// Anything that can be asked for the samples that arrived since last time.
pub trait SampleSource {
    /// Next batch; empty means nothing new yet. Batches may overlap or
    /// repeat earlier samples, the pipeline drops those.
    fn poll(&mut self) -> Result<Vec<Sample>>;

    /// True once the source will never produce another sample.
    fn is_exhausted(&self) -> bool {
        false
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn poll(&mut self) -> Result<Vec<Sample>> {
        (**self).poll()
    }

    fn is_exhausted(&self) -> bool {
        (**self).is_exhausted()
    }
}

/// Replays a recording in fixed-size batches.
///
/// With `overlap > 0` each batch re-sends the tail of the previous one,
/// like an endpoint that always returns its last N points.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Vec<Sample>,
    batch: usize,
    overlap: usize,
    pos: usize,
}

impl ReplaySource {
    pub fn new(samples: Vec<Sample>, batch: usize) -> Self {
        Self {
            samples,
            batch: batch.max(1),
            overlap: 0,
            pos: 0,
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }
}

impl SampleSource for ReplaySource {
    fn poll(&mut self) -> Result<Vec<Sample>> {
        if self.is_exhausted() {
            return Ok(Vec::new());
        }
        let start = if self.pos == 0 {
            0
        } else {
            self.pos.saturating_sub(self.overlap)
        };
        let end = (self.pos + self.batch).min(self.samples.len());
        self.pos = end;
        Ok(self.samples[start..end].to_vec())
    }

    fn is_exhausted(&self) -> bool {
        self.pos >= self.samples.len()
    }
}

/// Parameters of the synthetic single-lead generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub sampling_rate_hz: f64,
    pub heart_rate_bpm: f64,
    /// Uniform RR jitter, +/- ms.
    pub rr_jitter_ms: f64,
    pub qrs_amplitude_mv: f64,
    /// Respiratory baseline wander amplitude (mV) at 0.2 Hz.
    pub wander_mv: f64,
    pub mains_hz: f64,
    pub mains_mv: f64,
    /// White noise standard deviation (mV).
    pub noise_mv: f64,
    /// Simulated time produced per poll (ms).
    pub chunk_ms: f64,
    /// Stop after this much simulated time; `None` runs forever.
    pub duration_s: Option<f64>,
    pub start_ms: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 250.0,
            heart_rate_bpm: 72.0,
            rr_jitter_ms: 0.0,
            qrs_amplitude_mv: 1.2,
            wander_mv: 0.3,
            mains_hz: 50.0,
            mains_mv: 0.1,
            noise_mv: 0.02,
            chunk_ms: 500.0,
            duration_s: None,
            start_ms: 0.0,
            seed: 7,
        }
    }
}

/// Pseudo-ECG: Gaussian QRS spikes with small T waves, wander, hum and noise.
#[derive(Debug, Clone)]
pub struct SyntheticEcg {
    cfg: SyntheticConfig,
    rng: StdRng,
    index: u64,
    prev_beat_s: Option<f64>,
    next_beat_s: f64,
}

const QRS_WIDTH_S: f64 = 0.02;
const T_WAVE_DELAY_S: f64 = 0.25;
const T_WAVE_WIDTH_S: f64 = 0.04;

impl SyntheticEcg {
    pub fn new(cfg: SyntheticConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(cfg.seed),
            cfg,
            index: 0,
            prev_beat_s: None,
            next_beat_s: 0.3,
        }
    }

    fn next_rr_s(&mut self) -> f64 {
        let base = 60.0 / self.cfg.heart_rate_bpm.max(1.0);
        let jitter = self.cfg.rr_jitter_ms.abs() / 1000.0;
        let rr = if jitter > 0.0 {
            base + self.rng.gen_range(-jitter..=jitter)
        } else {
            base
        };
        rr.max(0.25)
    }

    fn gaussian_noise(&mut self) -> f64 {
        if self.cfg.noise_mv <= 0.0 {
            return 0.0;
        }
        // Box-Muller
        let u1: f64 = self.rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = self.rng.gen();
        self.cfg.noise_mv * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn beat_shape(&self, dt: f64) -> f64 {
        let qrs = (-0.5 * (dt / QRS_WIDTH_S).powi(2)).exp();
        let t_wave = (-0.5 * ((dt - T_WAVE_DELAY_S) / T_WAVE_WIDTH_S).powi(2)).exp();
        self.cfg.qrs_amplitude_mv * (qrs + 0.2 * t_wave)
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> Sample {
        let t = self.index as f64 / self.cfg.sampling_rate_hz;
        while t > self.next_beat_s + 0.5 * self.next_rr_estimate() {
            let rr = self.next_rr_s();
            self.prev_beat_s = Some(self.next_beat_s);
            self.next_beat_s += rr;
        }
        let mut v = self.beat_shape(t - self.next_beat_s);
        if let Some(prev) = self.prev_beat_s {
            v += self.beat_shape(t - prev);
        }
        v += self.cfg.wander_mv * (2.0 * PI * 0.2 * t).sin();
        v += self.cfg.mains_mv * (2.0 * PI * self.cfg.mains_hz * t).sin();
        v += self.gaussian_noise();
        self.index += 1;
        Sample::new(self.cfg.start_ms + t * 1000.0, v)
    }

    fn next_rr_estimate(&self) -> f64 {
        60.0 / self.cfg.heart_rate_bpm.max(1.0)
    }

    fn total_samples(&self) -> Option<u64> {
        self.cfg
            .duration_s
            .map(|d| (d * self.cfg.sampling_rate_hz).round() as u64)
    }
}

impl SampleSource for SyntheticEcg {
    fn poll(&mut self) -> Result<Vec<Sample>> {
        let chunk = ((self.cfg.chunk_ms / 1000.0) * self.cfg.sampling_rate_hz)
            .round()
            .max(1.0) as u64;
        let end = match self.total_samples() {
            Some(total) => (self.index + chunk).min(total),
            None => self.index + chunk,
        };
        let mut out = Vec::with_capacity((end.saturating_sub(self.index)) as usize);
        while self.index < end {
            out.push(self.next_sample());
        }
        Ok(out)
    }

    fn is_exhausted(&self) -> bool {
        self.total_samples().is_some_and(|total| self.index >= total)
    }
}

/// What a polling task did before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub polls: u64,
    pub samples: u64,
    pub errors: u64,
}

/// Polls a source on a dedicated thread at a fixed interval.
///
/// Batches go out over a channel; whoever owns the pipeline drains it and
/// calls `ingest`. Sources never see the pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Start polling. Batches arrive on the returned receiver; the channel
    /// closes when the source is exhausted or the task is stopped.
    pub fn spawn<S>(self, mut source: S) -> (PollerHandle, Receiver<Vec<Sample>>)
    where
        S: SampleSource + Send + 'static,
    {
        let (batch_tx, batch_rx) = unbounded();
        let (stop_tx, stop_rx) = bounded(1);
        let interval = self.interval;
        let handle =
            std::thread::spawn(move || run_poll_loop(&mut source, interval, batch_tx, stop_rx));
        (
            PollerHandle {
                stop_tx,
                handle: Some(handle),
            },
            batch_rx,
        )
    }
}

fn run_poll_loop<S: SampleSource>(
    source: &mut S,
    interval: Duration,
    batch_tx: Sender<Vec<Sample>>,
    stop_rx: Receiver<()>,
) -> PollSummary {
    let ticker = tick(interval);
    let mut summary = PollSummary::default();
    loop {
        summary.polls += 1;
        match source.poll() {
            Ok(batch) if !batch.is_empty() => {
                summary.samples += batch.len() as u64;
                if batch_tx.send(batch).is_err() {
                    info!("sample receiver dropped, stopping poller");
                    break;
                }
            }
            Ok(_) => {}
            Err(err) => {
                summary.errors += 1;
                warn!("poll failed: {err:#}");
            }
        }
        if source.is_exhausted() {
            info!("source exhausted after {} polls", summary.polls);
            break;
        }
        select! {
            recv(stop_rx) -> _ => {
                info!("poller stopped after {} polls", summary.polls);
                break;
            }
            recv(ticker) -> _ => {}
        }
    }
    summary
}

/// Cancellation handle for a running [`Poller`].
#[derive(Debug)]
pub struct PollerHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<PollSummary>>,
}

impl PollerHandle {
    /// Ask the task to stop and wait for it.
    pub fn stop(mut self) -> PollSummary {
        let _ = self.stop_tx.try_send(());
        self.join_inner()
    }

    /// Wait for the task to end on its own (source exhausted).
    pub fn join(mut self) -> PollSummary {
        self.join_inner()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    fn join_inner(&mut self) -> PollSummary {
        match self.handle.take().map(|h| h.join()) {
            Some(Ok(summary)) => summary,
            Some(Err(_)) => {
                warn!("poller thread panicked");
                PollSummary::default()
            }
            None => PollSummary::default(),
        }
    }
}
