pub mod engine;
pub mod hrv;
pub mod rhythm;

pub use engine::{Metrics, MetricsEngine};
pub use hrv::{hrv_time, HrvTime};
pub use rhythm::{classify, RhythmAssessment, RhythmClassifier, RhythmFlag, RhythmSummary};
