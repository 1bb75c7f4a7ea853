//! Shared-memory pixel storage using Linux memfd.
//!
//! The pixels live in a `MAP_SHARED` mapping of a file descriptor, so another
//! process that receives the fd (via `SCM_RIGHTS`) sees the same physical
//! pages.

use super::StorageKind;
use crate::error::{Error, Result};
use crate::observability::{
    record_release, record_release_failure, span_release, trace_release_failure,
};
use rustix::fd::{AsFd, BorrowedFd, OwnedFd};
use rustix::mm::{MapFlags, ProtFlags};
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use std::ptr::NonNull;

/// Pixel memory mapped from a shared-memory file descriptor.
///
/// Release unmaps the region and then closes the descriptor. The close
/// happens even when `munmap` fails; the failure is logged and counted.
///
/// # Example
///
/// ```rust,ignore
/// use pixel_storage::storage::SharedMemoryStorage;
///
/// // Create a 1MB shared memory region
/// let storage = SharedMemoryStorage::create("frame", 1024 * 1024)?;
///
/// // Hand a duplicate of the fd to another process...
/// let fd = storage.try_clone_fd()?;
/// ```
pub struct SharedMemoryStorage {
    /// The memfd (or other mappable) file descriptor.
    fd: OwnedFd,
    /// Pointer to the mmap'd region.
    ptr: NonNull<u8>,
    /// Mapped length.
    len: usize,
}

impl SharedMemoryStorage {
    /// Create an anonymous memfd of `size` bytes and map it read-write.
    ///
    /// # Arguments
    ///
    /// * `name` - Debug name for the segment (visible in `/proc/self/fd/`).
    /// * `size` - Size in bytes. Must be greater than 0.
    ///
    /// # Errors
    ///
    /// Returns an error if `memfd_create`, `ftruncate`, or `mmap` fails.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }

        let cname = CString::new(name).map_err(|e| Error::AllocationFailed(e.to_string()))?;
        let fd = rustix::fs::memfd_create(&cname, rustix::fs::MemfdFlags::CLOEXEC)?;
        rustix::fs::ftruncate(&fd, size as u64)?;

        // SAFETY: the memfd was just sized to `size` bytes.
        unsafe { Self::map_fd(fd, size) }
    }

    /// Map an existing descriptor read-write, taking ownership of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is shorter than `size` or `mmap` fails.
    ///
    /// # Safety
    ///
    /// No other party may shrink the file below `size` while the mapping
    /// exists; touching pages past the end of file raises `SIGBUS`.
    pub unsafe fn map_fd(fd: OwnedFd, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::AllocationFailed(
                "size must be greater than 0".into(),
            ));
        }
        let stat = rustix::fs::fstat(&fd)?;
        if (stat.st_size as u64) < size as u64 {
            return Err(Error::AllocationFailed(format!(
                "file holds {} bytes, {} requested",
                stat.st_size, size
            )));
        }

        // SAFETY: fresh mapping chosen by the kernel; the fd covers `size`.
        let ptr = unsafe {
            rustix::mm::mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                &fd,
                0,
            )?
        };

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| Error::AllocationFailed("mmap returned null".into()))?;

        Ok(Self { fd, ptr, len: size })
    }

    /// Adopt a mapping the caller already established.
    ///
    /// # Safety
    ///
    /// `address` must be the start of a live read-write mapping of `fd`
    /// spanning exactly `mapped_size` bytes, owned by nothing else. It is
    /// unmapped when this storage is dropped.
    pub unsafe fn from_raw_parts(address: NonNull<u8>, fd: OwnedFd, mapped_size: usize) -> Self {
        Self {
            fd,
            ptr: address,
            len: mapped_size,
        }
    }

    /// Start of the mapping.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Mapped size in bytes.
    pub fn capacity(&self) -> usize {
        self.len
    }

    /// Get the raw file descriptor.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Duplicate the descriptor (close-on-exec) for hand-off to another owner.
    pub fn try_clone_fd(&self) -> Result<OwnedFd> {
        Ok(rustix::io::fcntl_dupfd_cloexec(&self.fd, 0)?)
    }

    /// Touch every page so later pixel writes do not fault.
    pub fn prefault(&self) {
        let page_size = rustix::param::page_size();
        let ptr = self.ptr.as_ptr();
        for offset in (0..self.len).step_by(page_size) {
            // SAFETY: offset < len, inside the mapping.
            unsafe {
                std::ptr::read_volatile(ptr.add(offset));
            }
        }
    }
}

impl Drop for SharedMemoryStorage {
    fn drop(&mut self) {
        let _span = span_release(StorageKind::SharedMemory, self.len).entered();
        // SAFETY: we own the mapping and Drop runs once.
        if let Err(errno) = unsafe { rustix::mm::munmap(self.ptr.as_ptr().cast(), self.len) } {
            trace_release_failure(StorageKind::SharedMemory, "munmap", &errno);
            record_release_failure(StorageKind::SharedMemory, "munmap");
        }
        record_release(StorageKind::SharedMemory, self.len);
        // fd is closed when OwnedFd is dropped, after this body.
    }
}

// SAFETY: the mapping can be accessed from any thread; the fd is
// reference-counted by the kernel; pixel access is synchronized by the
// owning PixelBuffer.
unsafe impl Send for SharedMemoryStorage {}
unsafe impl Sync for SharedMemoryStorage {}

impl AsFd for SharedMemoryStorage {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl std::fmt::Debug for SharedMemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemoryStorage")
            .field("fd", &self.fd.as_raw_fd())
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
