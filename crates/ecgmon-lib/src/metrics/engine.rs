use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::hrv::{hrv_time, mean};
use crate::{
    error::{EcgError, Result},
    signal::BeatEvent,
};

/// Rhythm metrics over the current RR window.
///
/// `heart_rate_bpm` and `mean_rr_ms` are `None` until two beats have been
/// seen; use [`Metrics::heart_rate`] to get that as an error instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Beats observed since the session started.
    pub beats: usize,
    /// Intervals currently in the rolling window.
    pub rr_count: usize,
    pub heart_rate_bpm: Option<u32>,
    pub mean_rr_ms: Option<f64>,
    /// Standard deviation of RR (N-1); 0 with fewer than two intervals.
    pub hrv_ms: f64,
    pub rmssd_ms: f64,
    pub pnn50: f64,
}

impl Metrics {
    /// Compute from a window of RR intervals.
    pub fn from_intervals(rr_ms: &[f64], beats: usize) -> Self {
        let mean_rr_ms = mean(rr_ms);
        let heart_rate_bpm = mean_rr_ms
            .filter(|m| *m > 0.0)
            .map(|m| (60_000.0 / m).round() as u32);
        let extra = hrv_time(rr_ms);
        Self {
            beats,
            rr_count: rr_ms.len(),
            heart_rate_bpm,
            mean_rr_ms,
            hrv_ms: extra.sdnn_ms,
            rmssd_ms: extra.rmssd_ms,
            pnn50: extra.pnn50,
        }
    }

    pub fn heart_rate(&self) -> Result<u32> {
        self.heart_rate_bpm
            .ok_or(EcgError::InsufficientData { beats: self.beats })
    }

    pub fn mean_rr(&self) -> Result<f64> {
        self.mean_rr_ms
            .ok_or(EcgError::InsufficientData { beats: self.beats })
    }

    pub fn is_available(&self) -> bool {
        self.heart_rate_bpm.is_some()
    }
}

/// Keeps the last K RR intervals and recomputes [`Metrics`] on every beat.
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    window: VecDeque<f64>,
    capacity: usize,
    last_beat_ms: Option<f64>,
    beats: usize,
    current: Metrics,
}

impl MetricsEngine {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::new(),
            capacity,
            last_beat_ms: None,
            beats: 0,
            current: Metrics::default(),
        }
    }

    /// Seed an engine from precomputed RR intervals (as if beats preceded them).
    pub fn from_intervals(rr_ms: &[f64], capacity: usize) -> Self {
        let mut engine = Self::new(capacity);
        engine.beats = 1;
        for &rr in rr_ms {
            if engine.push_interval(rr) {
                engine.beats += 1;
            }
        }
        engine.current = engine.recompute();
        engine
    }

    /// Record a beat and return the refreshed metrics.
    pub fn on_beat(&mut self, beat: &BeatEvent) -> Metrics {
        let t = beat.timestamp_ms;
        if let Some(last) = self.last_beat_ms {
            let rr = t - last;
            if !(rr.is_finite() && rr > 0.0) {
                warn!("discarding beat at {t} ms: RR of {rr} ms after beat at {last} ms");
                return self.current;
            }
            self.beats += 1;
            self.push_interval(rr);
            debug!("beat at {t} ms, RR {rr:.1} ms");
        } else {
            self.beats += 1;
        }
        self.last_beat_ms = Some(t);
        self.current = self.recompute();
        self.current
    }

    fn push_interval(&mut self, rr_ms: f64) -> bool {
        if !(rr_ms.is_finite() && rr_ms > 0.0) {
            warn!("discarding non-positive RR interval {rr_ms} ms");
            return false;
        }
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(rr_ms);
        true
    }

    fn recompute(&self) -> Metrics {
        let rr: Vec<f64> = self.window.iter().copied().collect();
        Metrics::from_intervals(&rr, self.beats)
    }

    pub fn metrics(&self) -> Metrics {
        self.current
    }

    pub fn intervals(&self) -> Vec<f64> {
        self.window.iter().copied().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_beat_ms = None;
        self.beats = 0;
        self.current = Metrics::default();
    }
}
