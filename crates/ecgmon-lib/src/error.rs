use thiserror::Error;

/// Recoverable conditions raised by the streaming pipeline.
///
/// None of these stop a monitoring session: samples are dropped, filters
/// fall back to pass-through and metrics report "unavailable".
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EcgError {
    #[error("sample at {timestamp_ms} ms is not after last accepted sample at {last_timestamp_ms} ms")]
    OutOfOrderSample {
        timestamp_ms: f64,
        last_timestamp_ms: f64,
    },
    #[error("sample at {timestamp_ms} ms has a non-finite timestamp or amplitude")]
    MalformedSample { timestamp_ms: f64 },
    #[error("{stage} filter produced a non-finite output for input {input}")]
    FilterFault { stage: &'static str, input: f64 },
    #[error("need at least 2 beats, have {beats}")]
    InsufficientData { beats: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = EcgError> = std::result::Result<T, E>;
