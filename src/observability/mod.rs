//! Observability features: metrics and tracing.
//!
//! ## Metrics
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `pixel_storage_buffers_created` | Counter | Pixel buffers constructed |
//! | `pixel_storage_releases` | Counter | Backends released |
//! | `pixel_storage_release_failures` | Counter | Failed release steps (munmap, free callback) |
//! | `pixel_storage_reconfigures` | Counter | Successful reconfigurations |
//! | `pixel_storage_capacity_violations` | Counter | Oversize requests rejected |
//! | `pixel_storage_created_bytes` | Counter | Capacity of constructed buffers |
//! | `pixel_storage_released_bytes` | Counter | Bytes returned on release |
//!
//! All metrics carry a `backend` label (`heap`, `external`, `shared_memory`).
//!
//! ## Tracing
//!
//! Construction and reconfiguration log at `DEBUG`, capacity violations at
//! `WARN`, and release failures at `ERROR`. Each release runs in a `release`
//! span.

mod metrics;
mod tracing_support;

pub use metrics::{
    init_metrics, record_buffer_created, record_capacity_violation, record_reconfigure,
    record_release, record_release_failure,
};
pub use tracing_support::{
    span_release, trace_buffer_created, trace_capacity_violation, trace_reconfigure,
    trace_release_failure,
};
