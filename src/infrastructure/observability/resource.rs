//! Service resource identity attached to every exported signal.

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;

/// Service name used when `OTEL_SERVICE_NAME` is not set
pub const DEFAULT_SERVICE_NAME: &str = "memramp";

/// Builds the immutable attribute set shared by all three export channels.
///
/// Deterministic and side-effect free; the identity is constructed once at
/// startup and never mutated.
pub fn build_identity(explicit_name: Option<&str>) -> Resource {
    let service_name = explicit_name
        .map(str::to_owned)
        .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_owned());

    Resource::new([KeyValue::new(SERVICE_NAME, service_name)])
}
