//! Ordered, fault-tolerant teardown of the export channels.
//!
//! The trace channel drains first so the correlation span's terminal status
//! is durably exported before the log and metric buffers empty; a failure
//! on one channel never prevents draining the rest.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{error, info};

/// A flush or shutdown failure on one export channel.
///
/// Contained within the shutdown path and surfaced in the report; it never
/// propagates into the ramp loop.
#[derive(Debug, Error)]
#[error("{signal} channel: {message}")]
pub struct ExportFailure {
    pub signal: &'static str,
    pub message: String,
}

impl ExportFailure {
    pub fn new(signal: &'static str, message: impl Into<String>) -> Self {
        Self {
            signal,
            message: message.into(),
        }
    }
}

/// One export channel as seen by the shutdown sequencer.
///
/// Implementations must guarantee that all previously buffered records are
/// exported (or a bounded timeout exhausted) before `shutdown` returns, and
/// that further emissions after shutdown are no-ops.
pub trait TelemetryChannel {
    /// Signal kind carried by this channel (`trace`, `log`, `metric`)
    fn signal(&self) -> &'static str;

    /// Synchronously pushes all buffered records to the sink
    fn flush(&self) -> Result<(), ExportFailure>;

    /// Stops the background flush mechanism, draining the buffer first
    fn shutdown(&self) -> Result<(), ExportFailure>;
}

/// Summary of one drain pass
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Channels whose flush/shutdown cycle ran, in drain order
    pub flushed: Vec<&'static str>,
    /// Collected failures; draining continued past each of them
    pub failures: Vec<ExportFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_flushed(&self, signal: &str) -> bool {
        self.flushed.iter().any(|flushed| *flushed == signal)
    }
}

/// Drains every channel exactly once, in the order given.
///
/// Idempotent: a second drain touches no channel and reports the channels
/// already flushed by the first pass.
#[derive(Debug, Default)]
pub struct ShutdownSequencer {
    completed: AtomicBool,
    flushed: Mutex<Vec<&'static str>>,
}

impl ShutdownSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self, channels: &[&dyn TelemetryChannel]) -> ShutdownReport {
        if self.completed.swap(true, Ordering::SeqCst) {
            return ShutdownReport {
                flushed: self
                    .flushed
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .clone(),
                failures: Vec::new(),
            };
        }

        let mut report = ShutdownReport::default();
        for (step, channel) in channels.iter().enumerate() {
            info!(
                "Shutdown step {}: draining {} channel...",
                step + 1,
                channel.signal()
            );

            if let Err(failure) = channel.flush() {
                error!("Failed to flush {} channel: {}", failure.signal, failure.message);
                report.failures.push(failure);
            }
            if let Err(failure) = channel.shutdown() {
                error!(
                    "Failed to shut down {} channel: {}",
                    failure.signal, failure.message
                );
                report.failures.push(failure);
            }

            report.flushed.push(channel.signal());
        }

        *self
            .flushed
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = report.flushed.clone();

        info!("Telemetry drain complete.");
        report
    }
}
