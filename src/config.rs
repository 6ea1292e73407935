use std::env;
use std::time::Duration;

use crate::domain::errors::ConfigError;

pub const DEFAULT_CHUNK_MB: u64 = 10;
pub const DEFAULT_SLEEP_SECONDS: f64 = 0.5;
pub const DEFAULT_CAP_MB: u64 = 400;
pub const DEFAULT_EXPORT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

const MIB: u64 = 1024 * 1024;

/// Runtime configuration, read from environment variables.
///
/// All keys are optional. Validation happens here, before any allocation
/// or telemetry pipeline exists.
#[derive(Debug, Clone)]
pub struct Config {
    /// Overrides the default service name on the resource identity
    pub service_name: Option<String>,
    /// Megabytes allocated per ramp iteration
    pub chunk_mb: u64,
    /// Delay between iterations
    pub sleep_interval: Duration,
    /// Failure threshold in megabytes; `None` means the ramp runs until
    /// externally interrupted
    pub cap_mb: Option<u64>,
    /// Metric push period
    pub export_interval: Duration,
    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parses configuration from any key -> value source. `from_env` is the
    /// production path; tests inject maps here instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name = lookup("OTEL_SERVICE_NAME").filter(|name| !name.is_empty());

        let chunk_mb = parse_or("OOM_CHUNK_MB", &lookup, DEFAULT_CHUNK_MB)?;
        if chunk_mb == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }

        let sleep_seconds: f64 = parse_or("OOM_SLEEP_SECONDS", &lookup, DEFAULT_SLEEP_SECONDS)?;
        if !sleep_seconds.is_finite() || sleep_seconds < 0.0 {
            return Err(ConfigError::InvalidSleepInterval(sleep_seconds));
        }

        // 0 disables the cap: the ramp then runs until externally interrupted.
        let cap_mb = match parse_or("OOM_CAP_MB", &lookup, DEFAULT_CAP_MB)? {
            0 => None,
            cap => Some(cap),
        };

        let export_interval_ms = parse_or(
            "OTEL_METRIC_EXPORT_INTERVAL",
            &lookup,
            DEFAULT_EXPORT_INTERVAL_MS,
        )?;
        if export_interval_ms == 0 {
            return Err(ConfigError::ZeroExportInterval);
        }

        let otlp_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
            .filter(|endpoint| !endpoint.is_empty())
            .unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string());

        Ok(Config {
            service_name,
            chunk_mb,
            sleep_interval: Duration::from_secs_f64(sleep_seconds),
            cap_mb,
            export_interval: Duration::from_millis(export_interval_ms),
            otlp_endpoint,
        })
    }

    pub fn chunk_bytes(&self) -> u64 {
        self.chunk_mb * MIB
    }

    pub fn cap_bytes(&self) -> Option<u64> {
        self.cap_mb.map(|mb| mb * MIB)
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Malformed {
            key,
            reason: e.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}
