pub mod buffer;
pub mod config;
pub mod detectors;
pub mod error;
pub mod filters;
pub mod ingest;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod signal;

pub use buffer::SampleBuffer;
pub use config::{ClinicalThresholds, FilterConfig, PipelineConfig};
pub use detectors::*;
pub use error::{EcgError, Result};
pub use filters::FilterChain;
pub use metrics::*;
pub use pipeline::{EcgPipeline, PipelineSnapshot, PipelineStats};
pub use signal::*;
