//! Pull-based process and system gauges.
//!
//! Callbacks registered here run synchronously on the metric channel's
//! periodic export cycle. They must stay cheap and non-blocking, and must
//! not allocate significant memory, or they would distort the very RSS
//! signal they report.

use std::sync::Mutex;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Meter, ObservableGauge, Unit};
use sysinfo::{ProcessRefreshKind, System};

use crate::infrastructure::observability::pipelines::TelemetryError;

/// Registers the `process.memory.rss` gauge for the current process.
///
/// The callback refreshes only this process's memory statistics - a full
/// process-table refresh is too expensive for the export cycle - and tags
/// the observation with `state=rss`.
pub fn register_rss_gauge(meter: &Meter) -> Result<ObservableGauge<u64>, TelemetryError> {
    let pid = sysinfo::get_current_pid().map_err(TelemetryError::ProcessId)?;
    let sampler = Mutex::new(System::new());

    let gauge = meter
        .u64_observable_gauge("process.memory.rss")
        .with_description("Resident set size of the current process")
        .with_unit(Unit::new("By"))
        .with_callback(move |observer| {
            let mut system = sampler
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if system.refresh_process_specifics(pid, ProcessRefreshKind::new().with_memory()) {
                if let Some(process) = system.process(pid) {
                    observer.observe(process.memory(), &[KeyValue::new("state", "rss")]);
                }
            }
        })
        .init();

    Ok(gauge)
}

/// Auxiliary coarser-grained OS gauges: total/free system memory and
/// aggregate CPU utilization. Sampled on the same export cycle; no
/// interaction with the ramp state.
pub fn register_system_gauges(meter: &Meter) {
    let memory_sampler = Mutex::new(System::new());
    let _memory = meter
        .u64_observable_gauge("system.memory.usage")
        .with_description("System memory, by state")
        .with_unit(Unit::new("By"))
        .with_callback(move |observer| {
            let mut system = memory_sampler
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            system.refresh_memory();
            observer.observe(system.used_memory(), &[KeyValue::new("state", "used")]);
            observer.observe(system.free_memory(), &[KeyValue::new("state", "free")]);
        })
        .init();

    let cpu_sampler = Mutex::new(System::new());
    let _cpu = meter
        .f64_observable_gauge("system.cpu.utilization")
        .with_description("Aggregate CPU utilization since the previous export cycle")
        .with_callback(move |observer| {
            let mut system = cpu_sampler
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            system.refresh_cpu();
            let utilization = f64::from(system.global_cpu_info().cpu_usage()) / 100.0;
            observer.observe(utilization, &[]);
        })
        .init();
}
