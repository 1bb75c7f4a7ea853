//! Default sizes and allocation configuration.
//!
//! # Usage
//!
//! ```rust
//! use pixel_storage::config::AllocationOptions;
//!
//! let options = AllocationOptions::default()
//!     .with_row_alignment(64)
//!     .with_memfd_name("thumbnail");
//! assert_eq!(options.row_alignment, 64);
//! ```

/// Alignment of heap pixel allocations.
///
/// Large enough for any SIMD pixel loop and a cache line.
pub const HEAP_ALIGNMENT: usize = 64;

/// Maximum number of entries in an indexed color palette.
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// Name given to memfd segments when none is supplied (visible in `/proc/self/fd/`).
pub const DEFAULT_MEMFD_NAME: &str = "pixel-buffer";

/// Options for the convenience allocators in [`crate::allocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationOptions {
    /// Round the row stride up to a multiple of this many bytes.
    ///
    /// `1` means tightly packed rows. Must be a power of two.
    pub row_alignment: usize,
    /// Debug name for shared-memory allocations.
    pub memfd_name: String,
    /// Touch every page of shared-memory allocations up front.
    pub prefault: bool,
}

impl Default for AllocationOptions {
    fn default() -> Self {
        Self {
            row_alignment: 1,
            memfd_name: DEFAULT_MEMFD_NAME.to_string(),
            prefault: false,
        }
    }
}

impl AllocationOptions {
    /// Set the row alignment.
    pub fn with_row_alignment(mut self, row_alignment: usize) -> Self {
        self.row_alignment = row_alignment;
        self
    }

    /// Set the memfd debug name.
    pub fn with_memfd_name(mut self, name: impl Into<String>) -> Self {
        self.memfd_name = name.into();
        self
    }

    /// Enable or disable prefaulting.
    pub fn with_prefault(mut self, prefault: bool) -> Self {
        self.prefault = prefault;
        self
    }
}
