//! Externally owned pixel storage.

use super::StorageKind;
use crate::observability::{
    record_release, record_release_failure, span_release, trace_release_failure,
};
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::NonNull;

/// C-compatible free callback: `free_fn(address, context)`.
pub type FreeFn = unsafe extern "C" fn(address: *mut c_void, context: *mut c_void);

type ReleaseFn = Box<dyn FnOnce(NonNull<u8>) + Send>;

/// Opaque context pointer carried to the free callback.
struct Context(*mut c_void);

// SAFETY: the context is never dereferenced here, only handed back to the
// callback that produced it.
unsafe impl Send for Context {}

impl Context {
    fn into_inner(self) -> *mut c_void {
        self.0
    }
}

/// Pixel memory owned by a third party.
///
/// This storage never frees its address. On release it invokes the stored
/// callback exactly once, which hands the memory back to its owner. The
/// callback sits in a one-shot slot that release takes from, so no code path
/// can call it twice.
///
/// # Example
///
/// ```rust
/// use pixel_storage::storage::ExternalStorage;
/// use std::ptr::NonNull;
///
/// let mut pixels = vec![0u8; 64].into_boxed_slice();
/// let ptr = NonNull::new(pixels.as_mut_ptr()).unwrap();
/// let storage = unsafe {
///     ExternalStorage::with_release(ptr, Some(64), move |_| drop(pixels))
/// };
/// assert_eq!(storage.capacity(), Some(64));
/// ```
pub struct ExternalStorage {
    ptr: NonNull<u8>,
    capacity: Option<usize>,
    release: Option<ReleaseFn>,
}

impl ExternalStorage {
    /// Wrap memory released through a C callback.
    ///
    /// `capacity` is the usable size the owner guarantees, if known.
    ///
    /// # Safety
    ///
    /// `address` must stay valid and initialized for the capacity the
    /// buffer ends up using until `free_fn(address, context)` is called,
    /// and `free_fn` must be safe to call with exactly these arguments.
    pub unsafe fn from_raw_parts(
        address: NonNull<u8>,
        context: *mut c_void,
        free_fn: FreeFn,
        capacity: Option<usize>,
    ) -> Self {
        let context = Context(context);
        let release = move |address: NonNull<u8>| {
            // SAFETY: guaranteed by the caller of `from_raw_parts`.
            unsafe { free_fn(address.as_ptr().cast(), context.into_inner()) }
        };
        // SAFETY: forwarded from this function's contract.
        unsafe { Self::with_release(address, capacity, release) }
    }

    /// Wrap memory released through a Rust closure.
    ///
    /// # Safety
    ///
    /// `address` must stay valid and initialized for the capacity the
    /// buffer ends up using until `release` has been called.
    pub unsafe fn with_release<F>(address: NonNull<u8>, capacity: Option<usize>, release: F) -> Self
    where
        F: FnOnce(NonNull<u8>) + Send + 'static,
    {
        Self {
            ptr: address,
            capacity,
            release: Some(Box::new(release)),
        }
    }

    /// Start of the memory.
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    /// Capacity declared by the owner, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Record the capacity a buffer settled on when the owner declared none.
    pub(crate) fn settle_capacity(&mut self, capacity: usize) {
        self.capacity.get_or_insert(capacity);
    }
}

impl Drop for ExternalStorage {
    fn drop(&mut self) {
        let capacity = self.capacity.unwrap_or(0);
        let _span = span_release(StorageKind::External, capacity).entered();
        let Some(release) = self.release.take() else {
            return;
        };
        let ptr = self.ptr;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || release(ptr))) {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "free callback panicked".to_string());
            let error = std::io::Error::other(message);
            trace_release_failure(StorageKind::External, "free_callback", &error);
            record_release_failure(StorageKind::External, "free_callback");
        }
        record_release(StorageKind::External, capacity);
    }
}

// SAFETY: the memory is plain bytes; the callback is Send and only touched
// from Drop, which has exclusive access.
unsafe impl Send for ExternalStorage {}
unsafe impl Sync for ExternalStorage {}

impl std::fmt::Debug for ExternalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalStorage")
            .field("ptr", &self.ptr)
            .field("capacity", &self.capacity)
            .field("released", &self.release.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());

    unsafe extern "C" fn capture_free(address: *mut c_void, context: *mut c_void) {
        CALLS
            .lock()
            .unwrap()
            .push((address as usize, context as usize));
    }

    #[test]
    fn test_closure_called_once_with_address() {
        let mut pixels = vec![0u8; 32];
        let ptr = NonNull::new(pixels.as_mut_ptr()).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));

        let storage = {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            unsafe {
                ExternalStorage::with_release(ptr, None, move |addr| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    seen.store(addr.as_ptr() as usize, Ordering::SeqCst);
                })
            }
        };
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(storage);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), ptr.as_ptr() as usize);
    }

    #[test]
    fn test_c_callback_receives_address_and_context() {
        let mut pixels = vec![0u8; 16];
        let ptr = NonNull::new(pixels.as_mut_ptr()).unwrap();
        let context = 0xC0FFEE_usize as *mut c_void;

        let storage =
            unsafe { ExternalStorage::from_raw_parts(ptr, context, capture_free, Some(16)) };
        assert_eq!(storage.capacity(), Some(16));
        drop(storage);

        let calls = CALLS.lock().unwrap();
        let matching: Vec<_> = calls
            .iter()
            .filter(|(addr, _)| *addr == ptr.as_ptr() as usize)
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].1, 0xC0FFEE);
    }

    #[test]
    fn test_panicking_callback_is_contained() {
        let mut pixels = vec![0u8; 8];
        let ptr = NonNull::new(pixels.as_mut_ptr()).unwrap();
        let storage = unsafe {
            ExternalStorage::with_release(ptr, Some(8), |_| panic!("owner refused the memory"))
        };
        // Must not propagate out of drop.
        drop(storage);
    }
}
