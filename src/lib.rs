//! # pixel-storage
//!
//! Backing memory for bitmaps, behind one uniform handle.
//!
//! A [`PixelBuffer`](buffer::PixelBuffer) owns pixel memory from one of
//! three origins and releases it exactly once:
//!
//! - **Heap**: allocated and freed by this process.
//! - **External**: owned by a third party, returned through a free callback.
//! - **Shared memory**: a memfd mapping that can be passed to other processes.
//!
//! Alongside the memory it carries the image descriptor, row stride, an
//! optional shared color palette and a hardware-mipmap hint. Pixel access is
//! a lock/unlock protocol that serializes against metadata reconfiguration.
//!
//! ## Quick Start
//!
//! ```rust
//! use pixel_storage::prelude::*;
//!
//! let storage = SharedMemoryStorage::create("preview", 64).unwrap();
//! let buffer =
//!     PixelBuffer::new_shared_memory_backed(storage, ImageDescriptor::rgba(4, 4), 16, None)
//!         .unwrap();
//!
//! let mut pixels = buffer.lock_mut();
//! pixels.bytes_mut().fill(0x80);
//! pixels.unlock();
//!
//! assert!(buffer.lock().bytes().iter().all(|&b| b == 0x80));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod allocator;
pub mod buffer;
pub mod config;
pub mod error;
pub mod format;
pub mod lock;
pub mod observability;
pub mod palette;
pub mod storage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{BitmapExtras, PixelBuffer, PixelInfo};
    pub use crate::error::{Error, Result};
    pub use crate::format::{AlphaMode, ColorFormat, ImageDescriptor};
    pub use crate::lock::{PixelLock, PixelLockMut, PixelView};
    pub use crate::palette::ColorPalette;
    pub use crate::storage::{
        ExternalStorage, HeapStorage, SharedMemoryStorage, StorageBackend, StorageKind,
    };
}

pub use error::{Error, Result};
