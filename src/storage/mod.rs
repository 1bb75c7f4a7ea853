//! Storage backends for pixel memory.
//!
//! Pixel memory comes from one of three places, and each knows how to give
//! it back exactly once:
//!
//! - [`HeapStorage`]: allocated from the global allocator, freed on release.
//! - [`ExternalStorage`]: owned by a third party, handed back through a
//!   one-shot free callback.
//! - [`SharedMemoryStorage`]: a `MAP_SHARED` mapping of a file descriptor,
//!   unmapped and closed on release.
//!
//! [`StorageBackend`] is the closed sum of the three. Releasing consumes the
//! value, so a backend cannot be released twice.
//!
//! # Example
//!
//! ```rust
//! use pixel_storage::storage::{HeapStorage, StorageBackend, StorageKind};
//!
//! let backend = StorageBackend::from(HeapStorage::allocate(4096).unwrap());
//! assert_eq!(backend.kind(), StorageKind::Heap);
//! assert_eq!(backend.declared_capacity(), Some(4096));
//! backend.release();
//! ```

mod backend;
mod external;
mod heap;
mod shared;

pub use backend::StorageBackend;
pub use external::{ExternalStorage, FreeFn};
pub use heap::HeapStorage;
pub use shared::SharedMemoryStorage;

use std::fmt;

/// Which of the three storage origins backs a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Process heap.
    Heap,
    /// Caller-owned memory with a free callback.
    External,
    /// Mapped shared-memory file descriptor.
    SharedMemory,
}

impl StorageKind {
    /// Stable lowercase name, used as a metrics label.
    pub const fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Heap => "heap",
            StorageKind::External => "external",
            StorageKind::SharedMemory => "shared_memory",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
