use serde::{Deserialize, Serialize};

/// Time-domain HRV over a run of RR intervals (milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HrvTime {
    pub n: usize,
    pub mean_rr_ms: f64,
    /// Sample standard deviation (N-1) of RR.
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
    /// Fraction of successive differences above 50 ms.
    pub pnn50: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Unbiased standard deviation; 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    match mean(values) {
        Some(m) if n > 1 => {
            (values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
        }
        _ => 0.0,
    }
}

pub fn hrv_time(rr_ms: &[f64]) -> HrvTime {
    let n = rr_ms.len();
    let mean_rr_ms = mean(rr_ms).unwrap_or(0.0);
    let sdnn_ms = sample_std(rr_ms);
    let (rmssd_ms, pnn50) = if n > 1 {
        let diffs: Vec<f64> = rr_ms.windows(2).map(|w| w[1] - w[0]).collect();
        let rmssd = (diffs.iter().map(|d| d * d).sum::<f64>() / diffs.len() as f64).sqrt();
        let over = diffs.iter().filter(|d| d.abs() > 50.0).count();
        (rmssd, over as f64 / diffs.len() as f64)
    } else {
        (0.0, 0.0)
    };

    HrvTime {
        n,
        mean_rr_ms,
        sdnn_ms,
        rmssd_ms,
        pnn50,
    }
}
