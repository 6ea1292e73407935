//! OTLP observability for memramp
//!
//! Three independent export channels - traces, logs, and metrics - share one
//! immutable resource identity and nothing else. Each channel owns its own
//! background flush mechanism; emission is a non-blocking buffer submission
//! and sink failures never reach the ramp loop. The shutdown sequencer
//! drains the channels in a fixed order so the failure signal survives on
//! every exit path.

pub mod pipelines;
pub mod resource;
pub mod shutdown;
pub mod system_sampler;

pub use pipelines::{LogChannel, MetricChannel, TelemetryError, TelemetryPipelines, TraceChannel};
pub use resource::{DEFAULT_SERVICE_NAME, build_identity};
pub use shutdown::{ExportFailure, ShutdownReport, ShutdownSequencer, TelemetryChannel};
pub use system_sampler::{register_rss_gauge, register_system_gauges};
