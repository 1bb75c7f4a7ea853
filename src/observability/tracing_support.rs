//! Tracing integration for structured logging and spans.

use crate::format::ImageDescriptor;
use crate::storage::StorageKind;
use tracing::{Level, Span, span};

/// Create a span covering the release of one storage backend.
///
/// # Example
///
/// ```rust,ignore
/// use pixel_storage::observability::span_release;
///
/// let span = span_release(StorageKind::Heap, 4096);
/// let _guard = span.enter();
/// // Release steps here...
/// ```
#[inline]
pub fn span_release(kind: StorageKind, capacity: usize) -> Span {
    span!(Level::DEBUG, "release", backend = %kind, capacity = capacity)
}

/// Log a pixel buffer being constructed.
#[inline]
pub fn trace_buffer_created(
    kind: StorageKind,
    capacity: usize,
    descriptor: &ImageDescriptor,
    row_stride: usize,
) {
    tracing::debug!(
        backend = %kind,
        capacity = capacity,
        width = descriptor.width,
        height = descriptor.height,
        format = ?descriptor.color_format,
        row_stride = row_stride,
        "pixel buffer created"
    );
}

/// Log a completed reconfiguration.
#[inline]
pub fn trace_reconfigure(kind: StorageKind, descriptor: &ImageDescriptor, row_stride: usize) {
    tracing::debug!(
        backend = %kind,
        width = descriptor.width,
        height = descriptor.height,
        format = ?descriptor.color_format,
        alpha = ?descriptor.alpha_mode,
        row_stride = row_stride,
        "pixel buffer reconfigured"
    );
}

/// Log a rejected oversize request.
#[inline]
pub fn trace_capacity_violation(kind: StorageKind, required: usize, capacity: usize) {
    tracing::warn!(
        backend = %kind,
        required = required,
        capacity = capacity,
        "requested footprint exceeds backend capacity"
    );
}

/// Log a release step that failed.
#[inline]
pub fn trace_release_failure(kind: StorageKind, step: &str, error: &dyn std::error::Error) {
    tracing::error!(
        backend = %kind,
        step = %step,
        error = %error,
        "release step failed"
    );
}
