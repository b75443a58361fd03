use serde::{Deserialize, Serialize};
use std::fmt;

use super::engine::Metrics;
use crate::config::ClinicalThresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RhythmFlag {
    Tachycardia,
    Bradycardia,
    /// RR dispersion high enough to suggest an irregular rhythm.
    HighVariability,
}

/// Single headline for an assessment, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RhythmSummary {
    #[serde(rename = "Irregular Rhythm Detected")]
    IrregularRhythm,
    #[serde(rename = "Tachycardia Detected")]
    Tachycardia,
    #[serde(rename = "Bradycardia Detected")]
    Bradycardia,
    #[serde(rename = "Normal Sinus Rhythm")]
    NormalSinusRhythm,
}

impl RhythmSummary {
    pub fn label(&self) -> &'static str {
        match self {
            RhythmSummary::IrregularRhythm => "Irregular Rhythm Detected",
            RhythmSummary::Tachycardia => "Tachycardia Detected",
            RhythmSummary::Bradycardia => "Bradycardia Detected",
            RhythmSummary::NormalSinusRhythm => "Normal Sinus Rhythm",
        }
    }
}

impl fmt::Display for RhythmSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhythmAssessment {
    /// Raised flags in evaluation order (rate first, then variability).
    pub flags: Vec<RhythmFlag>,
    pub summary: RhythmSummary,
}

impl RhythmAssessment {
    pub fn has(&self, flag: RhythmFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn is_normal(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Threshold rules mapping heart rate and HRV to clinical flags.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RhythmClassifier {
    thresholds: ClinicalThresholds,
}

impl RhythmClassifier {
    pub fn new(thresholds: ClinicalThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &ClinicalThresholds {
        &self.thresholds
    }

    pub fn classify(&self, metrics: &Metrics) -> RhythmAssessment {
        self.classify_values(metrics.heart_rate_bpm.map(f64::from), metrics.hrv_ms)
    }

    /// Same rules on raw numbers; rate flags need a known heart rate.
    pub fn classify_values(&self, heart_rate_bpm: Option<f64>, hrv_ms: f64) -> RhythmAssessment {
        let t = &self.thresholds;
        let mut flags = Vec::with_capacity(2);
        if let Some(hr) = heart_rate_bpm {
            if hr > t.tachycardia_bpm {
                flags.push(RhythmFlag::Tachycardia);
            }
            if hr < t.bradycardia_bpm {
                flags.push(RhythmFlag::Bradycardia);
            }
        }
        if hrv_ms > t.hrv_ms {
            flags.push(RhythmFlag::HighVariability);
        }

        // messaging precedence: irregular > fast > slow
        let summary = if flags.contains(&RhythmFlag::HighVariability) {
            RhythmSummary::IrregularRhythm
        } else if flags.contains(&RhythmFlag::Tachycardia) {
            RhythmSummary::Tachycardia
        } else if flags.contains(&RhythmFlag::Bradycardia) {
            RhythmSummary::Bradycardia
        } else {
            RhythmSummary::NormalSinusRhythm
        };
        RhythmAssessment { flags, summary }
    }
}

/// Classify with the default clinical limits (100 / 60 bpm, 80 ms).
pub fn classify(metrics: &Metrics) -> RhythmAssessment {
    RhythmClassifier::default().classify(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(hr: u32, hrv: f64) -> Metrics {
        Metrics {
            beats: 10,
            rr_count: 9,
            heart_rate_bpm: Some(hr),
            mean_rr_ms: Some(60_000.0 / hr as f64),
            hrv_ms: hrv,
            ..Default::default()
        }
    }

    #[test]
    fn fast_and_steady_is_tachycardia() {
        let a = classify(&metrics(110, 10.0));
        assert_eq!(a.flags, vec![RhythmFlag::Tachycardia]);
        assert_eq!(a.summary.label(), "Tachycardia Detected");
    }

    #[test]
    fn variability_outranks_normal_rate() {
        let a = classify(&metrics(75, 95.0));
        assert!(a.has(RhythmFlag::HighVariability));
        assert_eq!(a.summary.to_string(), "Irregular Rhythm Detected");
    }

    #[test]
    fn variability_outranks_rate_flags() {
        let a = classify(&metrics(130, 120.0));
        assert_eq!(
            a.flags,
            vec![RhythmFlag::Tachycardia, RhythmFlag::HighVariability]
        );
        assert_eq!(a.summary, RhythmSummary::IrregularRhythm);

        let a = classify(&metrics(45, 5.0));
        assert_eq!(a.flags, vec![RhythmFlag::Bradycardia]);
        assert_eq!(a.summary, RhythmSummary::Bradycardia);
    }

    #[test]
    fn limits_are_exclusive() {
        let a = classify(&metrics(100, 80.0));
        assert!(a.is_normal());
        assert_eq!(a.summary, RhythmSummary::NormalSinusRhythm);
        assert!(classify(&metrics(60, 0.0)).is_normal());
    }

    #[test]
    fn no_heart_rate_means_no_rate_flags() {
        let a = classify(&Metrics::default());
        assert!(a.is_normal());
        assert_eq!(a.summary.label(), "Normal Sinus Rhythm");
    }

    #[test]
    fn classification_is_idempotent() {
        let m = metrics(52, 91.0);
        let first = classify(&m);
        for _ in 0..5 {
            assert_eq!(classify(&m), first);
        }
    }

    #[test]
    fn custom_limits() {
        let classifier = RhythmClassifier::new(ClinicalThresholds {
            tachycardia_bpm: 120.0,
            bradycardia_bpm: 50.0,
            hrv_ms: 150.0,
        });
        assert!(classifier.classify(&metrics(110, 100.0)).is_normal());
        assert_eq!(
            classifier.classify_values(Some(121.0), 0.0).summary,
            RhythmSummary::Tachycardia
        );
    }

    #[test]
    fn summary_serializes_as_label() {
        let a = classify(&metrics(75, 95.0));
        let js = serde_json::to_value(&a).unwrap();
        assert_eq!(js["summary"], "Irregular Rhythm Detected");
        assert_eq!(js["flags"][0], "HighVariability");
    }
}
