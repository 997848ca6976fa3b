use thiserror::Error;

/// Errors surfaced by the engine. Per-tick analysis failures are logged and
/// skipped by the live loop; these reach callers through config validation
/// and the offline batch entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("window length {actual} does not match configured FFT size {expected}")]
    InvalidWindowSize { expected: usize, actual: usize },

    #[error("{band} band frequency range maps to no FFT bins")]
    EmptyBandRange { band: &'static str },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
}
