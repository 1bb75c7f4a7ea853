//! Error types for pixel storage.

use crate::storage::StorageKind;
use thiserror::Error;

/// Result type alias using this crate's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pixel storage operations.
///
/// Only construction and reconfiguration report errors. Release is a
/// teardown path: its failures are logged and counted, never returned.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested footprint does not fit the backend's fixed capacity.
    #[error("capacity violation: {required} bytes required, backend holds {capacity}")]
    CapacityViolation {
        /// Bytes needed by the requested descriptor and row stride.
        required: usize,
        /// Fixed capacity of the backend.
        capacity: usize,
    },

    /// A backend-specific property was queried on a different backend.
    #[error("wrong backend: operation requires {expected} storage, buffer is {actual}")]
    WrongBackend {
        /// Backend the operation is meaningful for.
        expected: StorageKind,
        /// Backend the buffer actually has.
        actual: StorageKind,
    },

    /// Image descriptor is unusable (zero dimension, overflow).
    #[error("invalid image descriptor: {0}")]
    InvalidDescriptor(String),

    /// Row stride is smaller than one row of pixels.
    #[error("row stride {row_stride} is smaller than the minimum {min_row_bytes}")]
    InvalidRowStride {
        /// Requested stride in bytes.
        row_stride: usize,
        /// Bytes occupied by one row of pixels.
        min_row_bytes: usize,
    },

    /// Alpha mode cannot be represented by the color format.
    #[error("alpha mode {alpha:?} is not supported by color format {color_format:?}")]
    IncompatibleAlphaMode {
        /// Color format of the descriptor.
        color_format: crate::format::ColorFormat,
        /// Rejected alpha mode.
        alpha: crate::format::AlphaMode,
    },

    /// Indexed color format without a palette.
    #[error("color format {0:?} requires a color palette")]
    MissingPalette(crate::format::ColorFormat),

    /// Palette has no entries or too many.
    #[error("invalid color palette: {0}")]
    InvalidPalette(String),

    /// Memory allocation failed.
    #[error("memory allocation failed: {0}")]
    AllocationFailed(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// System call error (via rustix).
    #[error("system error: {0}")]
    System(#[from] rustix::io::Errno),
}

impl Error {
    /// Returns true if this is a capacity violation.
    pub fn is_capacity_violation(&self) -> bool {
        matches!(self, Error::CapacityViolation { .. })
    }

    /// Returns true if this is a wrong-backend query.
    pub fn is_wrong_backend(&self) -> bool {
        matches!(self, Error::WrongBackend { .. })
    }
}
