//! Metrics collection using metrics-rs.

use crate::storage::StorageKind;
use metrics::{Unit, counter};
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const BUFFERS_CREATED: &str = "pixel_storage_buffers_created";
const RELEASES: &str = "pixel_storage_releases";
const RELEASE_FAILURES: &str = "pixel_storage_release_failures";
const RECONFIGURES: &str = "pixel_storage_reconfigures";
const CAPACITY_VIOLATIONS: &str = "pixel_storage_capacity_violations";
const CREATED_BYTES: &str = "pixel_storage_created_bytes";
const RELEASED_BYTES: &str = "pixel_storage_released_bytes";

/// Initialize metrics descriptions.
///
/// Call this once at application startup before using any metrics.
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        BUFFERS_CREATED,
        Unit::Count,
        "Pixel buffers constructed, by storage backend"
    );
    metrics::describe_counter!(
        RELEASES,
        Unit::Count,
        "Storage backends released, by storage backend"
    );
    metrics::describe_counter!(
        RELEASE_FAILURES,
        Unit::Count,
        "Release steps that reported an error (munmap, free callback)"
    );
    metrics::describe_counter!(
        RECONFIGURES,
        Unit::Count,
        "Successful metadata reconfigurations"
    );
    metrics::describe_counter!(
        CAPACITY_VIOLATIONS,
        Unit::Count,
        "Reconfigure or construction requests exceeding backend capacity"
    );
    metrics::describe_counter!(
        CREATED_BYTES,
        Unit::Bytes,
        "Capacity of constructed pixel buffers"
    );
    metrics::describe_counter!(
        RELEASED_BYTES,
        Unit::Bytes,
        "Bytes returned by released storage backends"
    );
}

/// Record a pixel buffer constructed over `capacity` bytes.
#[inline]
pub fn record_buffer_created(kind: StorageKind, capacity: usize) {
    counter!(BUFFERS_CREATED, "backend" => kind.as_str()).increment(1);
    counter!(CREATED_BYTES, "backend" => kind.as_str()).increment(capacity as u64);
}

/// Record a backend release of `capacity` bytes.
///
/// External storage that never backed a buffer and declared no capacity
/// reports 0 bytes.
#[inline]
pub fn record_release(kind: StorageKind, capacity: usize) {
    counter!(RELEASES, "backend" => kind.as_str()).increment(1);
    counter!(RELEASED_BYTES, "backend" => kind.as_str()).increment(capacity as u64);
}

/// Record a failed release step.
#[inline]
pub fn record_release_failure(kind: StorageKind, step: &'static str) {
    counter!(RELEASE_FAILURES, "backend" => kind.as_str(), "step" => step).increment(1);
}

/// Record a successful reconfiguration.
#[inline]
pub fn record_reconfigure(kind: StorageKind) {
    counter!(RECONFIGURES, "backend" => kind.as_str()).increment(1);
}

/// Record a rejected oversize request.
#[inline]
pub fn record_capacity_violation(kind: StorageKind) {
    counter!(CAPACITY_VIOLATIONS, "backend" => kind.as_str()).increment(1);
}
