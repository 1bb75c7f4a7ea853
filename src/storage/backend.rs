//! The closed set of storage backends.

use super::{ExternalStorage, HeapStorage, SharedMemoryStorage, StorageKind};
use crate::error::{Error, Result};
use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use std::ptr::NonNull;

/// Exactly one of the three storage origins.
///
/// The variant is fixed at construction. Its address never moves, and its
/// capacity never changes.
#[derive(Debug)]
pub enum StorageBackend {
    /// Process heap.
    Heap(HeapStorage),
    /// Caller-owned memory with a free callback.
    External(ExternalStorage),
    /// Mapped shared-memory file descriptor.
    SharedMemory(SharedMemoryStorage),
}

impl StorageBackend {
    /// Which origin this is.
    pub fn kind(&self) -> StorageKind {
        match self {
            StorageBackend::Heap(_) => StorageKind::Heap,
            StorageBackend::External(_) => StorageKind::External,
            StorageBackend::SharedMemory(_) => StorageKind::SharedMemory,
        }
    }

    /// Start of the pixel memory.
    pub fn address(&self) -> NonNull<u8> {
        match self {
            StorageBackend::Heap(heap) => heap.as_ptr(),
            StorageBackend::External(external) => external.as_ptr(),
            StorageBackend::SharedMemory(shared) => shared.as_ptr(),
        }
    }

    /// Capacity fixed at construction.
    ///
    /// `None` for external memory whose owner did not declare a size.
    pub fn declared_capacity(&self) -> Option<usize> {
        match self {
            StorageBackend::Heap(heap) => Some(heap.capacity()),
            StorageBackend::External(external) => external.capacity(),
            StorageBackend::SharedMemory(shared) => Some(shared.capacity()),
        }
    }

    /// Fix the capacity of external memory whose owner declared none.
    ///
    /// Declared capacities are left as they are.
    pub(crate) fn settle_capacity(&mut self, capacity: usize) {
        if let StorageBackend::External(external) = self {
            external.settle_capacity(capacity);
        }
    }

    /// Borrow the shared-memory descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongBackend`] for heap and external storage.
    pub fn shared_memory_fd(&self) -> Result<BorrowedFd<'_>> {
        match self {
            StorageBackend::SharedMemory(shared) => Ok(shared.as_fd()),
            other => Err(Error::WrongBackend {
                expected: StorageKind::SharedMemory,
                actual: other.kind(),
            }),
        }
    }

    /// Duplicate the shared-memory descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongBackend`] for heap and external storage, or the
    /// `dup` failure.
    pub fn duplicate_shared_memory_fd(&self) -> Result<OwnedFd> {
        match self {
            StorageBackend::SharedMemory(shared) => shared.try_clone_fd(),
            other => Err(Error::WrongBackend {
                expected: StorageKind::SharedMemory,
                actual: other.kind(),
            }),
        }
    }

    /// Give the memory back: free, invoke the callback, or unmap and close.
    ///
    /// Consumes the backend, so it runs at most once.
    pub fn release(self) {
        drop(self);
    }
}

impl From<HeapStorage> for StorageBackend {
    fn from(storage: HeapStorage) -> Self {
        StorageBackend::Heap(storage)
    }
}

impl From<ExternalStorage> for StorageBackend {
    fn from(storage: ExternalStorage) -> Self {
        StorageBackend::External(storage)
    }
}

impl From<SharedMemoryStorage> for StorageBackend {
    fn from(storage: SharedMemoryStorage) -> Self {
        StorageBackend::SharedMemory(storage)
    }
}
