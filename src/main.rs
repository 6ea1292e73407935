//! memramp - controlled memory-exhaustion fault injector.
//!
//! Ramps resident memory in fixed chunks while exporting correlated
//! metrics, logs, and a single trace span over OTLP, so monitoring and
//! alerting pipelines can be validated end to end.
//!
//! # Environment Variables
//! - `OTEL_SERVICE_NAME` - service identity on every signal (default: memramp)
//! - `OOM_CHUNK_MB` - megabytes allocated per iteration (default: 10)
//! - `OOM_SLEEP_SECONDS` - delay between iterations (default: 0.5)
//! - `OOM_CAP_MB` - failure threshold; 0 disables the cap (default: 400)
//! - `OTEL_METRIC_EXPORT_INTERVAL` - metric push period in ms (default: 5000)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT` - collector endpoint (default: http://localhost:4317)
//!
//! Exit code is 1 when the ramp fails at its cap, 0 on a clean or
//! interrupted run.

use anyhow::Result;
use memramp::application::runner::RampRunner;
use memramp::config::Config;
use memramp::domain::errors::RampError;
use memramp::domain::ramp::MemoryRamp;
use memramp::infrastructure::observability::{self, pipelines};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Configuration errors are fatal and surface before any telemetry.
    let config = Config::from_env()?;

    let identity = observability::build_identity(config.service_name.as_deref());
    let telemetry = pipelines::bootstrap(&config, &identity)?;

    info!("memramp {} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        chunk_mb = config.chunk_mb,
        cap_mb = config.cap_mb,
        sleep_seconds = config.sleep_interval.as_secs_f64(),
        "Configuration loaded (exporting to {})",
        config.otlp_endpoint
    );

    let meter = telemetry.meter();
    observability::register_rss_gauge(&meter)?;
    observability::register_system_gauges(&meter);

    let mut ramp = MemoryRamp::new(config.chunk_bytes(), config.cap_bytes())?;
    let runner = RampRunner::new(config.sleep_interval);
    let tracer = telemetry.tracer();

    info!("Ramping memory. Press Ctrl+C to stop.");
    let outcome: Result<(), RampError> = tokio::select! {
        result = runner.run(&mut ramp, &tracer) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupt received; stopping the ramp.");
            Ok(())
        }
    };

    // Every exit path drains the channels: trace first so the span's
    // terminal status is durably exported, then logs, then metrics.
    let report = telemetry.shutdown_all();
    ramp.terminate();

    for failure in &report.failures {
        error!("Telemetry drain failure: {failure}");
    }

    match outcome {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("Run failed: {err}");
            std::process::exit(1);
        }
    }
}
