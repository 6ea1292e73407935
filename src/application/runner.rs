//! Drives the memory ramp and correlates its telemetry.
//!
//! One trace span covers the entire ramp; every allocated chunk emits one
//! structured log record. All emission is a non-blocking submission into the
//! channels' buffers - the loop's only suspension point is the configured
//! inter-chunk delay.

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::trace::{Span, Status, Tracer};
use opentelemetry_sdk::trace as sdktrace;
use tracing::{error, info};

use crate::domain::errors::RampError;
use crate::domain::ramp::MemoryRamp;

/// Runs a [`MemoryRamp`] to its cap failure, or forever when no cap is
/// configured (the surrounding task is then the only way to stop it).
pub struct RampRunner {
    sleep_interval: Duration,
}

impl RampRunner {
    pub fn new(sleep_interval: Duration) -> Self {
        Self { sleep_interval }
    }

    pub async fn run(
        &self,
        ramp: &mut MemoryRamp,
        tracer: &sdktrace::Tracer,
    ) -> Result<(), RampError> {
        let mut attributes = vec![
            KeyValue::new("ramp.chunk_bytes", ramp.chunk_bytes() as i64),
            KeyValue::new("ramp.sleep_seconds", self.sleep_interval.as_secs_f64()),
        ];
        if let Some(cap_bytes) = ramp.cap_bytes() {
            attributes.push(KeyValue::new("ramp.cap_bytes", cap_bytes as i64));
        }

        let mut span = tracer
            .span_builder("memory-ramp")
            .with_attributes(attributes)
            .start(tracer);

        info!(
            chunk_bytes = ramp.chunk_bytes(),
            cap_bytes = ramp.cap_bytes(),
            "Starting memory ramp"
        );

        loop {
            let Some(receipt) = ramp.allocate_chunk() else {
                break;
            };

            info!(
                chunk_index = receipt.chunk_index,
                allocated_bytes_total = receipt.allocated_bytes,
                "Allocated chunk"
            );

            // The cap is checked before sleeping so overshoot stays within
            // one chunk.
            if let Err(err) = ramp.enforce_cap() {
                annotate_failure(&mut span, &err);
                error!(
                    elapsed_seconds = ramp.elapsed().as_secs_f64(),
                    "Memory ramp failed: {err}"
                );
                span.end();
                return Err(err);
            }

            tokio::time::sleep(self.sleep_interval).await;
        }

        span.set_status(Status::Ok);
        span.end();
        Ok(())
    }
}

/// Records the failure on the correlation span: exception event first, then
/// the terminal error status carrying the failure message. Called exactly
/// once, as an explicit step before the failure propagates to the caller.
pub fn annotate_failure<S: Span>(span: &mut S, err: &RampError) {
    span.record_error(err);
    span.set_status(Status::error(err.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ramp::RampPhase;
    use opentelemetry::trace::{SpanContext, TracerProvider as _};
    use std::borrow::Cow;
    use std::time::SystemTime;

    /// Minimal span recording the calls annotate_failure makes
    struct FakeSpan {
        context: SpanContext,
        events: Vec<String>,
        statuses: Vec<Status>,
    }

    impl FakeSpan {
        fn new() -> Self {
            Self {
                context: SpanContext::empty_context(),
                events: Vec::new(),
                statuses: Vec::new(),
            }
        }
    }

    impl Span for FakeSpan {
        fn add_event_with_timestamp<T>(
            &mut self,
            name: T,
            _timestamp: SystemTime,
            _attributes: Vec<KeyValue>,
        ) where
            T: Into<Cow<'static, str>>,
        {
            self.events.push(name.into().into_owned());
        }

        fn span_context(&self) -> &SpanContext {
            &self.context
        }

        fn is_recording(&self) -> bool {
            true
        }

        fn set_attribute(&mut self, _attribute: KeyValue) {}

        fn set_status(&mut self, status: Status) {
            self.statuses.push(status);
        }

        fn update_name<T>(&mut self, _new_name: T)
        where
            T: Into<Cow<'static, str>>,
        {
        }

        fn end_with_timestamp(&mut self, _timestamp: SystemTime) {}
    }

    fn cap_error() -> RampError {
        RampError::CapReached {
            cap_bytes: 35,
            allocated_bytes: 40,
            chunks: 4,
        }
    }

    #[test]
    fn test_annotate_failure_records_exception_then_error_status() {
        let mut span = FakeSpan::new();
        let err = cap_error();

        annotate_failure(&mut span, &err);

        assert_eq!(span.events, vec!["exception".to_string()]);
        assert_eq!(span.statuses.len(), 1);
        match &span.statuses[0] {
            Status::Error { description, .. } => {
                assert!(!description.is_empty());
                assert!(description.contains("cap"));
            }
            other => panic!("expected error status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_fails_at_cap_with_failed_phase() {
        let provider = sdktrace::TracerProvider::builder().build();
        let tracer = provider.tracer("test");
        let mut ramp = MemoryRamp::new(1024, Some(4096)).unwrap();
        let runner = RampRunner::new(Duration::ZERO);

        let err = runner.run(&mut ramp, &tracer).await.unwrap_err();

        let RampError::CapReached { chunks, .. } = err;
        assert_eq!(chunks, 4);
        assert_eq!(ramp.phase(), RampPhase::Failed);
        assert_eq!(ramp.allocated_bytes(), 4096);
    }
}
