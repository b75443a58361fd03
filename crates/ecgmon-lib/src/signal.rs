use serde::{Deserialize, Serialize};

/// Anything that carries a monotonic timestamp in milliseconds.
pub trait Timestamped {
    fn timestamp_ms(&self) -> f64;
}

/// Raw voltage sample as delivered by an ingestion source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic time (ms)
    pub timestamp_ms: f64,
    /// Lead voltage (mV)
    pub amplitude: f64,
}

impl Sample {
    pub fn new(timestamp_ms: f64, amplitude: f64) -> Self {
        Self {
            timestamp_ms,
            amplitude,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.timestamp_ms.is_finite() && self.amplitude.is_finite()
    }
}

impl Timestamped for Sample {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }
}

/// Output of the filter chain for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilteredSample {
    pub timestamp_ms: f64,
    pub value: f64,
}

impl Timestamped for FilteredSample {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }
}

/// A detected QRS peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Position of the peak in the stream of accepted samples
    pub sample_index: u64,
    pub timestamp_ms: f64,
    /// Filtered value at the peak (mV)
    pub amplitude: f64,
}

/// Convert a duration in milliseconds into a whole number of samples at `fs`.
pub fn ms_to_samples(ms: f64, fs: f64) -> usize {
    (ms * fs / 1000.0).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refractory_in_samples() {
        assert_eq!(ms_to_samples(200.0, 250.0), 50);
        assert_eq!(ms_to_samples(200.0, 360.0), 72);
    }
}
