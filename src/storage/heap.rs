//! Heap-backed pixel storage.

use super::StorageKind;
use crate::config::HEAP_ALIGNMENT;
use crate::error::{Error, Result};
use crate::observability::{record_release, span_release};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Pixel memory allocated from the global allocator.
///
/// The block is owned exclusively and freed when the storage is dropped.
///
/// # Example
///
/// ```rust
/// use pixel_storage::storage::HeapStorage;
///
/// let storage = HeapStorage::allocate(1024).unwrap();
/// assert_eq!(storage.capacity(), 1024);
/// ```
pub struct HeapStorage {
    ptr: NonNull<u8>,
    size: usize,
}

impl HeapStorage {
    /// Layout used for every heap pixel block of `size` bytes.
    ///
    /// Memory passed to [`HeapStorage::from_raw_parts`] must have been
    /// allocated with exactly this layout.
    pub fn layout(size: usize) -> Result<Layout> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }
        Layout::from_size_align(size, HEAP_ALIGNMENT)
            .map_err(|e| Error::AllocationFailed(e.to_string()))
    }

    /// Allocate `size` zeroed bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if size is 0 or the allocator fails.
    pub fn allocate(size: usize) -> Result<Self> {
        let layout = Self::layout(size)?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or_else(|| {
            Error::AllocationFailed(format!("allocator returned null for {} bytes", size))
        })?;
        Ok(Self { ptr, size })
    }

    /// Adopt a block allocated elsewhere in this process.
    ///
    /// # Safety
    ///
    /// `ptr` must come from the global allocator with
    /// [`HeapStorage::layout`]`(size)`, be initialized for `size` bytes, and
    /// not be freed or owned by anything else.
    pub unsafe fn from_raw_parts(ptr: NonNull<u8>, size: usize) -> Self {
        Self { ptr, size }
    }

    /// Start of the block.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Allocated size in bytes.
    pub fn capacity(&self) -> usize {
        self.size
    }
}

impl Drop for HeapStorage {
    fn drop(&mut self) {
        let _span = span_release(StorageKind::Heap, self.size).entered();
        // SAFETY: the block was allocated with this layout (see `layout`) and
        // is owned by us alone; Drop runs once.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.size, HEAP_ALIGNMENT);
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
        record_release(StorageKind::Heap, self.size);
    }
}

// SAFETY: the block is plain bytes owned by this value; access is
// synchronized by the owning PixelBuffer.
unsafe impl Send for HeapStorage {}
unsafe impl Sync for HeapStorage {}

impl std::fmt::Debug for HeapStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapStorage")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_storage_creation() {
        let storage = HeapStorage::allocate(1024).unwrap();
        assert_eq!(storage.capacity(), 1024);
        assert_eq!(storage.as_ptr().as_ptr() as usize % HEAP_ALIGNMENT, 0);
    }

    #[test]
    fn test_heap_storage_zero_size_fails() {
        assert!(HeapStorage::allocate(0).is_err());
    }

    #[test]
    fn test_heap_storage_is_zeroed() {
        let storage = HeapStorage::allocate(256).unwrap();
        let slice = unsafe { std::slice::from_raw_parts(storage.as_ptr().as_ptr(), 256) };
        assert!(slice.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_heap_storage_from_raw_parts() {
        let layout = HeapStorage::layout(128).unwrap();
        let ptr = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).unwrap();
        let storage = unsafe { HeapStorage::from_raw_parts(ptr, 128) };
        assert_eq!(storage.as_ptr(), ptr);
        assert_eq!(storage.capacity(), 128);
        // Dropping frees the adopted block.
    }
}
