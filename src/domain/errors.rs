use thiserror::Error;

/// Errors raised while reading configuration.
///
/// Fatal by design: they surface before any allocation happens and before
/// any telemetry pipeline exists, so a misconfigured run emits no signals.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse {key}={value}: {reason}")]
    Malformed {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("Sleep interval must be a finite, non-negative number of seconds (got {0})")]
    InvalidSleepInterval(f64),

    #[error("Metric export interval must be greater than zero")]
    ZeroExportInterval,
}

/// Terminal failures of the memory ramp
#[derive(Debug, Error)]
pub enum RampError {
    /// The configured byte threshold was reached. Expected and deterministic:
    /// the whole point of the run is to make this failure observable.
    #[error(
        "Memory ramp reached its cap: {allocated_bytes} bytes across {chunks} chunks >= cap of {cap_bytes} bytes"
    )]
    CapReached {
        cap_bytes: u64,
        allocated_bytes: u64,
        chunks: u64,
    },
}
