//! Convenience allocators producing ready-to-use pixel buffers.
//!
//! These size the storage from the descriptor, so callers that do not
//! already hold memory never compute footprints by hand.
//!
//! ```rust
//! use pixel_storage::allocator::allocate_shared_memory_buffer;
//! use pixel_storage::config::AllocationOptions;
//! use pixel_storage::format::ImageDescriptor;
//!
//! let options = AllocationOptions::default().with_row_alignment(64);
//! let buffer = allocate_shared_memory_buffer(ImageDescriptor::rgba(10, 10), None, &options).unwrap();
//! assert_eq!(buffer.row_stride(), 64);
//! assert_eq!(buffer.allocation_byte_size(), 640);
//! ```

use crate::buffer::PixelBuffer;
use crate::config::AllocationOptions;
use crate::error::{Error, Result};
use crate::format::ImageDescriptor;
use crate::palette::ColorPalette;
use crate::storage::{HeapStorage, SharedMemoryStorage};
use std::sync::Arc;

/// Bytes needed to hold `descriptor` at `row_stride`.
///
/// # Errors
///
/// Fails for an invalid descriptor, a stride shorter than a row, or overflow.
pub fn compute_allocation_size(descriptor: &ImageDescriptor, row_stride: usize) -> Result<usize> {
    descriptor.checked_footprint(row_stride)
}

/// Minimum row bytes rounded up to `alignment`.
///
/// # Errors
///
/// Fails if `alignment` is not a power of two or the result overflows.
pub fn aligned_row_stride(descriptor: &ImageDescriptor, alignment: usize) -> Result<usize> {
    if !alignment.is_power_of_two() {
        return Err(Error::AllocationFailed(format!(
            "row alignment {} is not a power of 2",
            alignment
        )));
    }
    let min = descriptor.min_row_bytes()?;
    min.checked_next_multiple_of(alignment).ok_or_else(|| {
        Error::InvalidDescriptor(format!("row of {} bytes overflows when aligned", min))
    })
}

fn plan(descriptor: &ImageDescriptor, options: &AllocationOptions) -> Result<(usize, usize)> {
    let row_stride = aligned_row_stride(descriptor, options.row_alignment)?;
    let size = compute_allocation_size(descriptor, row_stride)?;
    Ok((row_stride, size))
}

/// Allocate a zeroed heap buffer sized for `descriptor`.
pub fn allocate_heap_buffer(
    descriptor: ImageDescriptor,
    palette: Option<Arc<ColorPalette>>,
    options: &AllocationOptions,
) -> Result<PixelBuffer> {
    let (row_stride, size) = plan(&descriptor, options)?;
    let storage = HeapStorage::allocate(size)?;
    PixelBuffer::new_heap_backed(storage, descriptor, row_stride, palette)
}

/// Allocate a memfd-backed buffer sized for `descriptor`.
pub fn allocate_shared_memory_buffer(
    descriptor: ImageDescriptor,
    palette: Option<Arc<ColorPalette>>,
    options: &AllocationOptions,
) -> Result<PixelBuffer> {
    let (row_stride, size) = plan(&descriptor, options)?;
    let storage = SharedMemoryStorage::create(&options.memfd_name, size)?;
    if options.prefault {
        storage.prefault();
    }
    PixelBuffer::new_shared_memory_backed(storage, descriptor, row_stride, palette)
}
