//! Lock guards granting access to pixel memory.
//!
//! A lock pins the buffer's metadata for as long as it is held:
//! [`PixelBuffer::reconfigure`](crate::buffer::PixelBuffer::reconfigure)
//! waits until every outstanding lock is gone, so the descriptor, stride and
//! palette a guard reports always match the bytes it exposes.
//!
//! Each guard carries its own metadata snapshot, so reading it never
//! touches the buffer again.

use crate::buffer::PixelInfo;
use crate::format::ImageDescriptor;
use crate::palette::ColorPalette;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::{Arc, RwLockReadGuard, RwLockWriteGuard};

/// Shared (read) access to pixel memory.
///
/// Any number of `PixelLock`s may be held at once, from any threads.
pub struct PixelLock<'a> {
    address: NonNull<u8>,
    info: Arc<PixelInfo>,
    _access: RwLockReadGuard<'a, ()>,
}

impl<'a> PixelLock<'a> {
    pub(crate) fn new(
        address: NonNull<u8>,
        info: Arc<PixelInfo>,
        access: RwLockReadGuard<'a, ()>,
    ) -> Self {
        Self {
            address,
            info,
            _access: access,
        }
    }

    /// Metadata snapshot held by this lock.
    pub fn info(&self) -> &PixelInfo {
        &self.info
    }

    /// Image descriptor at the time of locking.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.info.descriptor
    }

    /// Bytes between consecutive rows.
    pub fn row_stride(&self) -> usize {
        self.info.row_stride
    }

    /// Attached palette, if any.
    pub fn palette(&self) -> Option<&Arc<ColorPalette>> {
        self.info.palette.as_ref()
    }

    /// Raw start of the pixel memory.
    pub fn as_ptr(&self) -> *const u8 {
        self.address.as_ptr()
    }

    /// Number of bytes covered by the current metadata (`row_stride * height`).
    pub fn byte_len(&self) -> usize {
        self.info.byte_len()
    }

    /// All pixel bytes.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: the footprint was checked against the backend capacity, and
        // no PixelLockMut can coexist with this guard.
        unsafe { std::slice::from_raw_parts(self.address.as_ptr(), self.byte_len()) }
    }

    /// Pixel bytes of row `y`, without stride padding.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of bounds.
    pub fn row(&self, y: u32) -> &[u8] {
        let range = self.info.row_range(y);
        &self.bytes()[range]
    }

    /// Plain view of the locked pixels for read-only consumers.
    pub fn view(&self) -> PixelView<'_> {
        PixelView::new(self.address, &self.info)
    }

    /// Release the lock.
    pub fn unlock(self) {}
}

/// Exclusive (write) access to pixel memory.
///
/// Holding a `PixelLockMut` excludes every other lock and every metadata
/// change on the same buffer.
pub struct PixelLockMut<'a> {
    address: NonNull<u8>,
    info: Arc<PixelInfo>,
    _access: RwLockWriteGuard<'a, ()>,
}

impl<'a> PixelLockMut<'a> {
    pub(crate) fn new(
        address: NonNull<u8>,
        info: Arc<PixelInfo>,
        access: RwLockWriteGuard<'a, ()>,
    ) -> Self {
        Self {
            address,
            info,
            _access: access,
        }
    }

    /// Metadata snapshot held by this lock.
    pub fn info(&self) -> &PixelInfo {
        &self.info
    }

    /// Image descriptor at the time of locking.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.info.descriptor
    }

    /// Bytes between consecutive rows.
    pub fn row_stride(&self) -> usize {
        self.info.row_stride
    }

    /// Attached palette, if any.
    pub fn palette(&self) -> Option<&Arc<ColorPalette>> {
        self.info.palette.as_ref()
    }

    /// Raw start of the pixel memory.
    pub fn as_ptr(&self) -> *const u8 {
        self.address.as_ptr()
    }

    /// Raw mutable start of the pixel memory.
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.address.as_ptr()
    }

    /// Number of bytes covered by the current metadata (`row_stride * height`).
    pub fn byte_len(&self) -> usize {
        self.info.byte_len()
    }

    /// All pixel bytes.
    pub fn bytes(&self) -> &[u8] {
        // SAFETY: see PixelLock::bytes; this guard is exclusive.
        unsafe { std::slice::from_raw_parts(self.address.as_ptr(), self.byte_len()) }
    }

    /// All pixel bytes, writable.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: footprint fits the capacity and the write guard is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.address.as_ptr(), self.byte_len()) }
    }

    /// Pixel bytes of row `y`, writable.
    ///
    /// # Panics
    ///
    /// Panics if `y` is out of bounds.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let range = self.info.row_range(y);
        &mut self.bytes_mut()[range]
    }

    /// Plain view of the locked pixels for read-only consumers.
    pub fn view(&self) -> PixelView<'_> {
        PixelView::new(self.address, &self.info)
    }

    /// Release the lock.
    pub fn unlock(self) {}
}

/// Address, stride, descriptor and palette of locked pixels.
///
/// This is the plain form handed to rendering or encoding code. It borrows
/// the lock it came from, so it cannot outlive it.
#[derive(Clone)]
pub struct PixelView<'a> {
    address: NonNull<u8>,
    row_stride: usize,
    descriptor: ImageDescriptor,
    palette: Option<Arc<ColorPalette>>,
    _lock: PhantomData<&'a [u8]>,
}

impl<'a> PixelView<'a> {
    fn new(address: NonNull<u8>, info: &PixelInfo) -> Self {
        Self {
            address,
            row_stride: info.row_stride,
            descriptor: info.descriptor,
            palette: info.palette.clone(),
            _lock: PhantomData,
        }
    }

    /// Raw start of the pixel memory.
    pub fn address(&self) -> *const u8 {
        self.address.as_ptr()
    }

    /// Bytes between consecutive rows.
    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Image descriptor.
    pub fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// Attached palette, if any.
    pub fn palette(&self) -> Option<&Arc<ColorPalette>> {
        self.palette.as_ref()
    }

    /// All pixel bytes.
    pub fn bytes(&self) -> &'a [u8] {
        let len = self.row_stride * self.descriptor.height as usize;
        // SAFETY: the view borrows a live lock whose footprint is `len`.
        unsafe { std::slice::from_raw_parts(self.address.as_ptr(), len) }
    }
}

impl std::fmt::Debug for PixelView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelView")
            .field("address", &self.address)
            .field("row_stride", &self.row_stride)
            .field("descriptor", &self.descriptor)
            .field("palette_entries", &self.palette.as_ref().map(|p| p.len()))
            .finish()
    }
}
