//! Telemetry pipeline bootstrap: three independent OTLP export channels.
//!
//! Each channel owns its background flush mechanism - a batch span
//! processor, a batch log processor, and a periodic metric reader - all
//! running on the tokio runtime and parameterized by the shared resource
//! identity. Construction never blocks on the collector: the gRPC channel
//! connects lazily, so an unreachable sink surfaces on first flush rather
//! than here. Installing the tracing bridge is process-wide state with a
//! single init call, guarded against re-initialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs as sdklogs;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace as sdktrace;
use opentelemetry_sdk::{Resource, runtime};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::Config;
use crate::infrastructure::observability::shutdown::{
    ExportFailure, ShutdownReport, ShutdownSequencer, TelemetryChannel,
};

// The tracing bridge attaches to the process-wide subscriber; one shot per
// process, even if an install step fails partway.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Failures while installing the telemetry pipelines
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry pipelines are already initialized")]
    AlreadyInitialized,

    #[error("Failed to install span pipeline: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to install log pipeline: {0}")]
    Logs(#[from] opentelemetry::logs::LogError),

    #[error("Failed to install metric pipeline: {0}")]
    Metrics(#[from] opentelemetry::metrics::MetricsError),

    #[error("Failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),

    #[error("Cannot resolve current process id: {0}")]
    ProcessId(&'static str),
}

/// Span export channel: batch span processor + OTLP exporter
#[derive(Debug)]
pub struct TraceChannel {
    provider: sdktrace::TracerProvider,
}

impl TraceChannel {
    fn install(endpoint: &str, identity: Resource) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()?;

        let provider = sdktrace::TracerProvider::builder()
            .with_config(sdktrace::config().with_resource(identity))
            .with_batch_exporter(exporter, runtime::Tokio)
            .build();

        global::set_tracer_provider(provider.clone());
        Ok(Self { provider })
    }

    /// Tracer for the ramp's correlation span
    pub fn tracer(&self) -> sdktrace::Tracer {
        self.provider.tracer("memramp")
    }
}

impl TelemetryChannel for TraceChannel {
    fn signal(&self) -> &'static str {
        "trace"
    }

    fn flush(&self) -> Result<(), ExportFailure> {
        let failures: Vec<String> = self
            .provider
            .force_flush()
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExportFailure::new("trace", failures.join("; ")))
        }
    }

    fn shutdown(&self) -> Result<(), ExportFailure> {
        global::shutdown_tracer_provider();
        Ok(())
    }
}

/// Log export channel: batch log processor + OTLP exporter, bridged into
/// the `tracing` subscriber so every structured record is mirrored here in
/// addition to the console.
#[derive(Debug)]
pub struct LogChannel {
    provider: sdklogs::LoggerProvider,
}

impl LogChannel {
    fn install(endpoint: &str, identity: Resource) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_log_exporter()?;

        let provider = sdklogs::LoggerProvider::builder()
            .with_config(sdklogs::Config::default().with_resource(identity))
            .with_batch_exporter(exporter, runtime::Tokio)
            .build();

        global::set_logger_provider(provider.clone());
        Ok(Self { provider })
    }
}

impl TelemetryChannel for LogChannel {
    fn signal(&self) -> &'static str {
        "log"
    }

    fn flush(&self) -> Result<(), ExportFailure> {
        let failures: Vec<String> = self
            .provider
            .force_flush()
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ExportFailure::new("log", failures.join("; ")))
        }
    }

    fn shutdown(&self) -> Result<(), ExportFailure> {
        global::shutdown_logger_provider();
        Ok(())
    }
}

/// Metric export channel: periodic reader pulling all registered observable
/// instruments on the configured interval and pushing them to the sink.
#[derive(Debug)]
pub struct MetricChannel {
    provider: SdkMeterProvider,
}

impl MetricChannel {
    fn install(
        endpoint: &str,
        identity: Resource,
        export_interval: Duration,
    ) -> Result<Self, TelemetryError> {
        let provider = opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_resource(identity)
            .with_period(export_interval)
            .build()?;

        global::set_meter_provider(provider.clone());
        Ok(Self { provider })
    }

    /// Meter for registering observable instruments. Their callbacks run
    /// synchronously on this channel's periodic export cycle.
    pub fn meter(&self) -> Meter {
        self.provider.meter("memramp")
    }
}

impl TelemetryChannel for MetricChannel {
    fn signal(&self) -> &'static str {
        "metric"
    }

    fn flush(&self) -> Result<(), ExportFailure> {
        self.provider
            .force_flush()
            .map_err(|e| ExportFailure::new("metric", e.to_string()))
    }

    fn shutdown(&self) -> Result<(), ExportFailure> {
        self.provider
            .shutdown()
            .map_err(|e| ExportFailure::new("metric", e.to_string()))
    }
}

/// The three export channels plus the sequencer that drains them.
#[derive(Debug)]
pub struct TelemetryPipelines {
    trace: TraceChannel,
    log: LogChannel,
    metric: MetricChannel,
    sequencer: ShutdownSequencer,
}

impl TelemetryPipelines {
    pub fn tracer(&self) -> sdktrace::Tracer {
        self.trace.tracer()
    }

    pub fn meter(&self) -> Meter {
        self.metric.meter()
    }

    /// Drains trace, then log, then metric, collecting failures instead of
    /// aborting on them. Safe to call more than once; also runs from `Drop`
    /// as a last resort so no exit path skips it.
    pub fn shutdown_all(&self) -> ShutdownReport {
        self.sequencer.drain(&[
            &self.trace as &dyn TelemetryChannel,
            &self.log,
            &self.metric,
        ])
    }
}

impl Drop for TelemetryPipelines {
    fn drop(&mut self) {
        let _ = self.shutdown_all();
    }
}

/// Builds all three channels against the shared resource identity, installs
/// them as the process-wide providers, and wires the subscriber stack:
/// console output plus the OTLP log bridge.
pub fn bootstrap(config: &Config, identity: &Resource) -> Result<TelemetryPipelines, TelemetryError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(TelemetryError::AlreadyInitialized);
    }

    let endpoint = config.otlp_endpoint.as_str();
    let trace = TraceChannel::install(endpoint, identity.clone())?;
    let log = LogChannel::install(endpoint, identity.clone())?;
    let metric = MetricChannel::install(endpoint, identity.clone(), config.export_interval)?;

    // Keep the exporters' own gRPC chatter out of the bridge so export
    // activity cannot feed back into the log channel.
    let bridge_filter = Targets::new()
        .with_default(LevelFilter::INFO)
        .with_target("h2", LevelFilter::OFF)
        .with_target("tonic", LevelFilter::OFF)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("opentelemetry", LevelFilter::OFF);
    let bridge = OpenTelemetryTracingBridge::new(&log.provider).with_filter(bridge_filter);

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(stdout_layer)
        .with(bridge)
        .try_init()?;

    info!("Telemetry pipelines connected (exporting to {endpoint})");

    Ok(TelemetryPipelines {
        trace,
        log,
        metric,
        sequencer: ShutdownSequencer::new(),
    })
}
