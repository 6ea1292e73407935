use std::time::Duration;

use futures::future::BoxFuture;
use memramp::application::runner::RampRunner;
use memramp::domain::errors::RampError;
use memramp::domain::ramp::{MemoryRamp, RampPhase};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::trace as sdktrace;
use tracing_test::traced_test;

const MIB: u64 = 1024 * 1024;

fn test_tracer() -> (sdktrace::TracerProvider, sdktrace::Tracer) {
    let provider = sdktrace::TracerProvider::builder().build();
    let tracer = provider.tracer("test");
    (provider, tracer)
}

#[tokio::test]
async fn test_cap_scenario_10mb_chunks_35mb_cap() {
    let (_provider, tracer) = test_tracer();
    let mut ramp = MemoryRamp::new(10 * MIB, Some(35 * MIB)).unwrap();
    let runner = RampRunner::new(Duration::ZERO);

    let err = runner.run(&mut ramp, &tracer).await.unwrap_err();

    // 40 MB >= 35 MB on the 4th iteration.
    let RampError::CapReached {
        cap_bytes,
        allocated_bytes,
        chunks,
    } = err;
    assert_eq!(chunks, 4);
    assert_eq!(allocated_bytes, 40 * MIB);
    assert_eq!(cap_bytes, 35 * MIB);
    assert_eq!(ramp.phase(), RampPhase::Failed);
    assert_eq!(ramp.chunks_allocated(), 4);
}

#[tokio::test]
#[traced_test]
async fn test_one_log_record_per_allocated_chunk() {
    let (_provider, tracer) = test_tracer();
    let mut ramp = MemoryRamp::new(1024, Some(4096)).unwrap();
    let runner = RampRunner::new(Duration::ZERO);

    let _ = runner.run(&mut ramp, &tracer).await;

    logs_assert(|lines: &[&str]| {
        let allocated = lines
            .iter()
            .filter(|line| line.contains("Allocated chunk"))
            .count();
        let failed = lines
            .iter()
            .filter(|line| line.contains("Memory ramp failed"))
            .count();
        if allocated != 4 {
            return Err(format!("expected 4 allocation records, saw {allocated}"));
        }
        if failed != 1 {
            return Err(format!("expected 1 failure record, saw {failed}"));
        }
        Ok(())
    });
}

#[tokio::test]
async fn test_uncapped_ramp_runs_until_externally_stopped() {
    let (_provider, tracer) = test_tracer();
    let mut ramp = MemoryRamp::new(1024, None).unwrap();
    let runner = RampRunner::new(Duration::from_millis(1));

    // No cap: the run has no self-termination path, so the caller's timeout
    // is the only thing that stops it.
    let stopped = tokio::time::timeout(
        Duration::from_millis(50),
        runner.run(&mut ramp, &tracer),
    )
    .await;
    assert!(stopped.is_err());

    assert_eq!(ramp.phase(), RampPhase::Ramping);
    assert!(ramp.chunks_allocated() > 0);

    // The shutdown path still terminates the machine afterwards.
    ramp.terminate();
    assert_eq!(ramp.phase(), RampPhase::Terminated);
    assert!(ramp.allocate_chunk().is_none());
}

// Exporter standing in for an unreachable collector
#[derive(Debug)]
struct UnreachableSinkExporter;

impl SpanExporter for UnreachableSinkExporter {
    fn export(&mut self, _batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        Box::pin(std::future::ready(Err(
            opentelemetry::trace::TraceError::from("sink unreachable"),
        )))
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sink_failure_does_not_alter_ramp_transitions() {
    let provider = sdktrace::TracerProvider::builder()
        .with_batch_exporter(UnreachableSinkExporter, opentelemetry_sdk::runtime::Tokio)
        .build();
    let tracer = provider.tracer("test");

    let mut ramp = MemoryRamp::new(1024, Some(4096)).unwrap();
    let runner = RampRunner::new(Duration::ZERO);

    let err = runner.run(&mut ramp, &tracer).await.unwrap_err();

    // The state machine behaves identically with a dead sink.
    let RampError::CapReached { chunks, .. } = err;
    assert_eq!(chunks, 4);
    assert_eq!(ramp.phase(), RampPhase::Failed);
    assert_eq!(ramp.allocated_bytes(), 4096);
}
