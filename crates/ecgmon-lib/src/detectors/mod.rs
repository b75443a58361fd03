pub mod beat;

pub use beat::{BeatDetector, DetectorConfig};
