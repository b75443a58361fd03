use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{
    error::{EcgError, Result},
    signal::ms_to_samples,
};

/// Upper bound on any sample or interval window (about an hour at 250 Hz).
pub const MAX_WINDOW: usize = 1 << 20;

/// Cutoffs and orders for the three filter stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// High-pass cutoff (Hz), removes baseline wander.
    pub highpass_hz: f64,
    /// Number of cascaded first-order high-pass sections.
    pub highpass_order: usize,
    /// Low-pass cutoff (Hz), removes EMG and HF noise.
    pub lowpass_hz: f64,
    /// Number of cascaded first-order low-pass sections.
    pub lowpass_order: usize,
    /// Mains frequency to reject (Hz); 0 disables the notch.
    pub notch_hz: f64,
    /// -3 dB width of the notch (Hz).
    pub notch_bandwidth_hz: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            highpass_hz: 0.5,
            highpass_order: 1,
            lowpass_hz: 40.0,
            lowpass_order: 1,
            notch_hz: 50.0,
            notch_bandwidth_hz: 2.0,
        }
    }
}

/// Clinical decision limits used by the rhythm classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalThresholds {
    pub tachycardia_bpm: f64,
    pub bradycardia_bpm: f64,
    /// RR standard deviation above which the rhythm is flagged irregular (ms).
    pub hrv_ms: f64,
}

impl Default for ClinicalThresholds {
    fn default() -> Self {
        Self {
            tachycardia_bpm: 100.0,
            bradycardia_bpm: 60.0,
            hrv_ms: 80.0,
        }
    }
}

/// Every tunable of a monitoring session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub sampling_rate_hz: f64,
    /// Display window length in samples.
    pub buffer_capacity: usize,
    /// Beat detector look-back (seconds).
    pub detection_window_s: f64,
    /// Minimum distance between accepted beats (ms).
    pub refractory_ms: f64,
    /// Number of RR intervals kept for metrics.
    pub rr_window: usize,
    /// Fixed R-peak amplitude threshold on the filtered signal (mV).
    pub detection_threshold_mv: f64,
    pub filter: FilterConfig,
    pub thresholds: ClinicalThresholds,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 250.0,
            buffer_capacity: 2500,
            detection_window_s: 1.0,
            refractory_ms: 200.0,
            rr_window: 30,
            detection_threshold_mv: 0.7,
            filter: FilterConfig::default(),
            thresholds: ClinicalThresholds::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Self = toml::from_str(text).context("parsing pipeline config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read a TOML config file from disk.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string(self).context("serializing pipeline config")
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(EcgError::InvalidConfig(msg));
        if !(self.sampling_rate_hz.is_finite() && self.sampling_rate_hz > 0.0) {
            return invalid(format!(
                "sampling_rate_hz must be positive, got {}",
                self.sampling_rate_hz
            ));
        }
        if !(1..=MAX_WINDOW).contains(&self.buffer_capacity) {
            return invalid(format!(
                "buffer_capacity must be in 1..={MAX_WINDOW}, got {}",
                self.buffer_capacity
            ));
        }
        if !(2..=MAX_WINDOW).contains(&self.rr_window) {
            return invalid(format!(
                "rr_window must be in 2..={MAX_WINDOW}, got {}",
                self.rr_window
            ));
        }
        let window = self.detection_window_samples();
        if !self.detection_window_s.is_finite() || !(3..=MAX_WINDOW).contains(&window) {
            return invalid(format!(
                "detection window of {} s must hold 3..={MAX_WINDOW} samples",
                self.detection_window_s
            ));
        }
        if !(self.refractory_ms.is_finite() && self.refractory_ms >= 0.0) {
            return invalid(format!("refractory_ms must be >= 0, got {}", self.refractory_ms));
        }
        let f = &self.filter;
        for (name, value) in [
            ("filter.highpass_hz", f.highpass_hz),
            ("filter.lowpass_hz", f.lowpass_hz),
            ("filter.notch_hz", f.notch_hz),
        ] {
            if !(value >= 0.0) {
                return invalid(format!("{name} must be >= 0, got {value}"));
            }
        }
        if f.notch_hz > 0.0 && !(f.notch_bandwidth_hz > 0.0) {
            return invalid("filter.notch_bandwidth_hz must be positive".into());
        }
        let t = &self.thresholds;
        if !(t.tachycardia_bpm.is_finite() && t.bradycardia_bpm.is_finite()) {
            return invalid(format!(
                "rate limits must be finite, got {} / {}",
                t.bradycardia_bpm, t.tachycardia_bpm
            ));
        }
        if t.bradycardia_bpm >= t.tachycardia_bpm {
            return invalid(format!(
                "bradycardia limit {} must be below tachycardia limit {}",
                t.bradycardia_bpm, t.tachycardia_bpm
            ));
        }
        if !(t.hrv_ms >= 0.0) {
            return invalid(format!("thresholds.hrv_ms must be >= 0, got {}", t.hrv_ms));
        }
        Ok(())
    }

    pub fn refractory_samples(&self) -> usize {
        ms_to_samples(self.refractory_ms, self.sampling_rate_hz)
    }

    pub fn detection_window_samples(&self) -> usize {
        ms_to_samples(self.detection_window_s * 1000.0, self.sampling_rate_hz)
    }
}
