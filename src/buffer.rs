//! The pixel buffer: one storage backend plus the metadata to read it.

use crate::error::{Error, Result};
use crate::format::{AlphaMode, ImageDescriptor};
use crate::lock::{PixelLock, PixelLockMut};
use crate::observability::{
    record_buffer_created, record_capacity_violation, record_reconfigure, trace_buffer_created,
    trace_capacity_violation, trace_reconfigure,
};
use crate::palette::ColorPalette;
use crate::storage::{
    ExternalStorage, HeapStorage, SharedMemoryStorage, StorageBackend, StorageKind,
};
use bytes::Bytes;
use rustix::fd::{BorrowedFd, OwnedFd};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockWriteGuard};

/// Descriptor, row stride and palette, published together.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelInfo {
    /// How to interpret the pixel bytes.
    pub descriptor: ImageDescriptor,
    /// Bytes between the starts of consecutive rows.
    pub row_stride: usize,
    /// Lookup table for indexed formats.
    pub palette: Option<Arc<ColorPalette>>,
}

impl PixelInfo {
    /// `row_stride * height`.
    pub fn byte_len(&self) -> usize {
        self.row_stride * self.descriptor.height as usize
    }

    pub(crate) fn row_range(&self, y: u32) -> Range<usize> {
        assert!(
            y < self.descriptor.height,
            "row {} out of bounds for height {}",
            y,
            self.descriptor.height
        );
        let start = y as usize * self.row_stride;
        let len = self.descriptor.width as usize * self.descriptor.bytes_per_pixel();
        start..start + len
    }

    /// Validate against a backend capacity and return the footprint.
    fn check(&self, kind: StorageKind, capacity: usize) -> Result<usize> {
        let required = self.descriptor.checked_footprint(self.row_stride)?;
        if self.descriptor.color_format.is_indexed() && self.palette.is_none() {
            return Err(Error::MissingPalette(self.descriptor.color_format));
        }
        if required > capacity {
            trace_capacity_violation(kind, required, capacity);
            record_capacity_violation(kind);
            return Err(Error::CapacityViolation { required, capacity });
        }
        Ok(required)
    }
}

/// Left, top, right, bottom insets of a nine-patch image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NinePatchInsets {
    /// Left inset in pixels.
    pub left: i32,
    /// Top inset in pixels.
    pub top: i32,
    /// Right inset in pixels.
    pub right: i32,
    /// Bottom inset in pixels.
    pub bottom: i32,
}

/// Opaque bitmap-level payload carried next to the pixels.
///
/// None of these fields are inspected or validated here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BitmapExtras {
    /// Serialized nine-patch chunk.
    pub nine_patch_chunk: Option<Bytes>,
    /// Nine-patch optical insets.
    pub nine_patch_insets: Option<NinePatchInsets>,
    /// Display density in dots per inch.
    pub density: Option<u32>,
}

/// Backing memory of a bitmap behind one uniform handle.
///
/// A `PixelBuffer` owns exactly one [`StorageBackend`] and releases it when
/// dropped. Pixel access goes through [`lock`](Self::lock) (shared) and
/// [`lock_mut`](Self::lock_mut) (exclusive); metadata changes wait for all
/// locks to be released and are published in one step.
///
/// Queries such as [`width`](Self::width) read the published snapshot and
/// never wait on pixel locks, so they may be called while holding one.
///
/// # Example
///
/// ```rust
/// use pixel_storage::buffer::PixelBuffer;
/// use pixel_storage::format::ImageDescriptor;
/// use pixel_storage::storage::HeapStorage;
///
/// let storage = HeapStorage::allocate(64).unwrap();
/// let buffer = PixelBuffer::new_heap_backed(storage, ImageDescriptor::rgba(4, 4), 16, None).unwrap();
///
/// let mut lock = buffer.lock_mut();
/// lock.row_mut(0).fill(0xFF);
/// lock.unlock();
///
/// assert_eq!(buffer.lock().row(0), &[0xFF; 16]);
/// ```
pub struct PixelBuffer {
    backend: StorageBackend,
    capacity: usize,
    // Held shared by `lock`, exclusive by `lock_mut` and metadata changes.
    access: RwLock<()>,
    // Only replaced while `access` is held exclusively.
    info: Mutex<Arc<PixelInfo>>,
    hardware_mipmap: AtomicBool,
    extras: BitmapExtras,
}

impl PixelBuffer {
    /// Create a buffer over heap storage.
    ///
    /// # Errors
    ///
    /// Fails if the descriptor is invalid, `row_stride` is shorter than a row,
    /// an indexed format lacks a palette, or the footprint exceeds the
    /// allocation. The storage is freed on failure.
    pub fn new_heap_backed(
        storage: HeapStorage,
        descriptor: ImageDescriptor,
        row_stride: usize,
        palette: Option<Arc<ColorPalette>>,
    ) -> Result<Self> {
        Self::from_backend(storage.into(), descriptor, row_stride, palette)
    }

    /// Create a buffer over externally owned memory.
    ///
    /// When the owner declared no capacity, the initial footprint becomes
    /// the capacity for the buffer's whole lifetime.
    ///
    /// # Errors
    ///
    /// As for [`new_heap_backed`](Self::new_heap_backed). On failure the
    /// free callback has already been invoked.
    pub fn new_externally_backed(
        storage: ExternalStorage,
        descriptor: ImageDescriptor,
        row_stride: usize,
        palette: Option<Arc<ColorPalette>>,
    ) -> Result<Self> {
        Self::from_backend(storage.into(), descriptor, row_stride, palette)
    }

    /// Create a buffer over a shared-memory mapping.
    ///
    /// # Errors
    ///
    /// As for [`new_heap_backed`](Self::new_heap_backed). On failure the
    /// mapping is unmapped and the descriptor closed.
    pub fn new_shared_memory_backed(
        storage: SharedMemoryStorage,
        descriptor: ImageDescriptor,
        row_stride: usize,
        palette: Option<Arc<ColorPalette>>,
    ) -> Result<Self> {
        Self::from_backend(storage.into(), descriptor, row_stride, palette)
    }

    /// Create a buffer over any backend.
    pub fn from_backend(
        mut backend: StorageBackend,
        descriptor: ImageDescriptor,
        row_stride: usize,
        palette: Option<Arc<ColorPalette>>,
    ) -> Result<Self> {
        let info = PixelInfo {
            descriptor,
            row_stride,
            palette,
        };
        let kind = backend.kind();
        let capacity = match backend.declared_capacity() {
            Some(capacity) => capacity,
            None => info.descriptor.checked_footprint(info.row_stride)?,
        };
        info.check(kind, capacity)?;
        backend.settle_capacity(capacity);

        trace_buffer_created(kind, capacity, &info.descriptor, info.row_stride);
        record_buffer_created(kind, capacity);

        Ok(Self {
            backend,
            capacity,
            access: RwLock::new(()),
            info: Mutex::new(Arc::new(info)),
            hardware_mipmap: AtomicBool::new(false),
            extras: BitmapExtras::default(),
        })
    }

    /// Attach opaque bitmap-level payload.
    pub fn with_extras(mut self, extras: BitmapExtras) -> Self {
        self.extras = extras;
        self
    }

    /// Opaque bitmap-level payload given at construction.
    pub fn extras(&self) -> &BitmapExtras {
        &self.extras
    }

    // ------------------------------------------------------------------
    // Lock protocol
    // ------------------------------------------------------------------

    /// Take shared access to the pixels.
    ///
    /// Blocks only while a reconfiguration or a [`lock_mut`](Self::lock_mut)
    /// holder is active.
    pub fn lock(&self) -> PixelLock<'_> {
        let access = self.access.read().unwrap_or_else(PoisonError::into_inner);
        PixelLock::new(self.backend.address(), self.snapshot(), access)
    }

    /// Take exclusive access to the pixels.
    pub fn lock_mut(&self) -> PixelLockMut<'_> {
        let access = self.exclusive();
        PixelLockMut::new(self.backend.address(), self.snapshot(), access)
    }

    /// Take shared access without waiting.
    ///
    /// Returns `None` if an exclusive holder is active.
    pub fn try_lock(&self) -> Option<PixelLock<'_>> {
        use std::sync::TryLockError;
        let access = match self.access.try_read() {
            Ok(access) => access,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        Some(PixelLock::new(self.backend.address(), self.snapshot(), access))
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.access.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Arc<PixelInfo> {
        Arc::clone(&self.info.lock().unwrap_or_else(PoisonError::into_inner))
    }

    // ------------------------------------------------------------------
    // Reconfiguration
    // ------------------------------------------------------------------

    /// Reinterpret the existing allocation with new metadata.
    ///
    /// `row_stride` defaults to the descriptor's minimum row bytes. The
    /// palette reference is replaced by `palette`, detaching it when `None`.
    /// Waits until no locks are outstanding, then publishes all three fields
    /// at once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapacityViolation`] if `row_stride * height` exceeds
    /// the backend capacity, or a validation error. The previous metadata is
    /// left untouched on error.
    pub fn reconfigure(
        &self,
        descriptor: ImageDescriptor,
        row_stride: Option<usize>,
        palette: Option<Arc<ColorPalette>>,
    ) -> Result<()> {
        let row_stride = match row_stride {
            Some(stride) => stride,
            None => descriptor.min_row_bytes()?,
        };
        let next = PixelInfo {
            descriptor,
            row_stride,
            palette,
        };
        // Capacity is immutable, so validation needs no lock.
        next.check(self.kind(), self.capacity)?;

        let exclusive = self.exclusive();
        self.publish(&exclusive, next);
        Ok(())
    }

    /// Reinterpret with a new descriptor at its minimum row stride, keeping
    /// the current palette.
    pub fn reconfigure_descriptor(&self, descriptor: ImageDescriptor) -> Result<()> {
        let row_stride = descriptor.min_row_bytes()?;
        let exclusive = self.exclusive();
        let next = PixelInfo {
            descriptor,
            row_stride,
            palette: self.snapshot().palette.clone(),
        };
        next.check(self.kind(), self.capacity)?;
        self.publish(&exclusive, next);
        Ok(())
    }

    /// Change only the alpha mode.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IncompatibleAlphaMode`] if the color format cannot
    /// carry `alpha_mode`.
    pub fn set_alpha_mode(&self, alpha_mode: AlphaMode) -> Result<()> {
        let exclusive = self.exclusive();
        let current = self.snapshot();
        if current.descriptor.alpha_mode == alpha_mode {
            return Ok(());
        }
        let color_format = current.descriptor.color_format;
        if !color_format.supports_alpha_mode(alpha_mode) {
            return Err(Error::IncompatibleAlphaMode {
                color_format,
                alpha: alpha_mode,
            });
        }
        let next = PixelInfo {
            descriptor: current.descriptor.with_alpha_mode(alpha_mode),
            ..PixelInfo::clone(&current)
        };
        self.publish(&exclusive, next);
        Ok(())
    }

    /// Toggle between premultiplied and straight alpha.
    ///
    /// Opaque buffers stay opaque.
    pub fn set_premultiplied(&self, premultiplied: bool) -> Result<()> {
        let current = self.alpha_mode();
        self.set_alpha_mode(AlphaMode::from_premultiplied(current, premultiplied))
    }

    /// Replace the palette reference.
    ///
    /// The previously attached palette is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPalette`] when detaching the palette of an
    /// indexed buffer.
    pub fn set_palette(&self, palette: Option<Arc<ColorPalette>>) -> Result<()> {
        let exclusive = self.exclusive();
        let current = self.snapshot();
        if palette.is_none() && current.descriptor.color_format.is_indexed() {
            return Err(Error::MissingPalette(current.descriptor.color_format));
        }
        let next = PixelInfo {
            palette,
            ..PixelInfo::clone(&current)
        };
        self.publish(&exclusive, next);
        Ok(())
    }

    /// Swap in new metadata. Requires the exclusive access guard.
    fn publish(&self, _exclusive: &RwLockWriteGuard<'_, ()>, next: PixelInfo) {
        trace_reconfigure(self.kind(), &next.descriptor, next.row_stride);
        record_reconfigure(self.kind());
        *self.info.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    // ------------------------------------------------------------------
    // Hints
    // ------------------------------------------------------------------

    /// Whether a renderer should generate mipmaps when uploading.
    pub fn has_hardware_mipmap(&self) -> bool {
        self.hardware_mipmap.load(Ordering::Relaxed)
    }

    /// Set the mipmap hint.
    pub fn set_has_hardware_mipmap(&self, has_mipmap: bool) {
        self.hardware_mipmap.store(has_mipmap, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Copy of the current metadata.
    pub fn info(&self) -> PixelInfo {
        PixelInfo::clone(&self.snapshot())
    }

    /// Current descriptor.
    pub fn descriptor(&self) -> ImageDescriptor {
        self.snapshot().descriptor
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.descriptor().width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.descriptor().height
    }

    /// Current alpha mode.
    pub fn alpha_mode(&self) -> AlphaMode {
        self.descriptor().alpha_mode
    }

    /// Bytes between the starts of consecutive rows.
    pub fn row_stride(&self) -> usize {
        self.snapshot().row_stride
    }

    /// Attached palette, if any.
    pub fn palette(&self) -> Option<Arc<ColorPalette>> {
        self.snapshot().palette.clone()
    }

    /// Which backend holds the pixels.
    pub fn kind(&self) -> StorageKind {
        self.backend.kind()
    }

    /// Fixed capacity of the backend, not the bytes currently in use.
    pub fn allocation_byte_size(&self) -> usize {
        self.capacity
    }

    /// Borrow the shared-memory descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongBackend`] unless the buffer is shared-memory backed.
    pub fn shared_memory_fd(&self) -> Result<BorrowedFd<'_>> {
        self.backend.shared_memory_fd()
    }

    /// Duplicate the shared-memory descriptor for another owner.
    pub fn duplicate_shared_memory_fd(&self) -> Result<OwnedFd> {
        self.backend.duplicate_shared_memory_fd()
    }

    /// Release the backend now.
    ///
    /// Equivalent to dropping the buffer.
    pub fn release(self) {
        let Self { backend, .. } = self;
        backend.release();
    }
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("backend", &self.kind())
            .field("capacity", &self.capacity)
            .field("info", &self.info())
            .field("hardware_mipmap", &self.has_hardware_mipmap())
            .finish()
    }
}
