//! Integration tests for pixel buffers across all three backends.

use pixel_storage::prelude::*;
use std::ffi::c_void;
use std::os::fd::AsRawFd;
use std::ptr::NonNull;
use std::sync::Arc;

// ============================================================================
// End-to-end
// ============================================================================

/// Test a 4x4 RGBA shared-memory buffer from construction to release.
#[test]
fn test_shared_memory_end_to_end() {
    let name = "pixel-e2e";
    let storage = SharedMemoryStorage::create(name, 64).unwrap();
    let buffer =
        PixelBuffer::new_shared_memory_backed(storage, ImageDescriptor::rgba(4, 4), 16, None)
            .unwrap();
    assert_eq!(buffer.allocation_byte_size(), 64);
    assert_eq!(buffer.row_stride(), 16);

    let pattern: Vec<u8> = (0..64u8).map(|i| i.wrapping_mul(7) ^ 0x5A).collect();
    {
        let mut lock = buffer.lock_mut();
        assert_eq!(lock.byte_len(), 64);
        lock.bytes_mut().copy_from_slice(&pattern);
        lock.unlock();
    }

    let raw_fd = {
        let lock = buffer.lock();
        assert_eq!(lock.bytes(), pattern.as_slice());
        assert_eq!(lock.row(2), &pattern[32..48]);
        lock.unlock();
        buffer.shared_memory_fd().unwrap().as_raw_fd()
    };

    buffer.release();

    let target = std::fs::read_link(format!("/proc/self/fd/{}", raw_fd))
        .ok()
        .map(|p| p.to_string_lossy().into_owned());
    assert!(!target.is_some_and(|t| t.contains(name)));
}

/// Test that pixels written through one mapping are visible through a duplicate fd.
#[test]
fn test_shared_memory_visible_to_second_mapping() {
    let storage = SharedMemoryStorage::create("pixel-dup", 64).unwrap();
    let buffer =
        PixelBuffer::new_shared_memory_backed(storage, ImageDescriptor::rgba(4, 4), 16, None)
            .unwrap();
    buffer.lock_mut().row_mut(0).fill(0xAB);

    let fd = buffer.duplicate_shared_memory_fd().unwrap();
    let mirror = unsafe { SharedMemoryStorage::map_fd(fd, 64).unwrap() };
    let mirror =
        PixelBuffer::new_shared_memory_backed(mirror, ImageDescriptor::rgba(4, 4), 16, None)
            .unwrap();
    assert_eq!(mirror.lock().row(0), &[0xAB; 16]);
}

// ============================================================================
// Reconfigure
// ============================================================================

/// Test the capacity boundary: exactly-full succeeds, one row more fails.
#[test]
fn test_reconfigure_capacity_boundary() {
    let storage = HeapStorage::allocate(96).unwrap();
    let buffer =
        PixelBuffer::new_heap_backed(storage, ImageDescriptor::rgba(4, 4), 16, None).unwrap();

    // 24 * 4 == 96: fits exactly.
    buffer
        .reconfigure(ImageDescriptor::rgba(4, 4), Some(24), None)
        .unwrap();

    // 24 * 5 == 120: too big.
    let err = buffer
        .reconfigure(ImageDescriptor::rgba(4, 5), Some(24), None)
        .unwrap_err();
    match err {
        Error::CapacityViolation { required, capacity } => {
            assert_eq!(required, 120);
            assert_eq!(capacity, 96);
        }
        other => panic!("unexpected error: {}", other),
    }

    let lock = buffer.lock();
    assert_eq!(*lock.descriptor(), ImageDescriptor::rgba(4, 4));
    assert_eq!(lock.row_stride(), 24);
}

/// Test that a format change reinterprets the same bytes.
#[test]
fn test_reconfigure_reinterprets_bytes() {
    let storage = HeapStorage::allocate(64).unwrap();
    let buffer =
        PixelBuffer::new_heap_backed(storage, ImageDescriptor::rgba(4, 4), 16, None).unwrap();
    let before = buffer.lock().as_ptr();
    buffer.lock_mut().bytes_mut()[0] = 0x42;

    let gray = ImageDescriptor::new(8, 8, ColorFormat::Gray8, AlphaMode::Opaque);
    buffer.reconfigure_descriptor(gray).unwrap();

    let lock = buffer.lock();
    assert_eq!(lock.as_ptr(), before);
    assert_eq!(lock.row_stride(), 8);
    assert_eq!(lock.row(0)[0], 0x42);
}

// ============================================================================
// Palettes
// ============================================================================

fn indexed(width: u32, height: u32) -> ImageDescriptor {
    ImageDescriptor::new(width, height, ColorFormat::Index8, AlphaMode::Premultiplied)
}

/// Test that swapping one buffer's palette never touches another's.
#[test]
fn test_palette_swap_is_isolated() {
    let p = ColorPalette::shared(vec![0xFF00_0000, 0xFFFF_0000]).unwrap();
    let q = ColorPalette::shared(vec![0xFF00_FF00]).unwrap();
    let r = ColorPalette::shared(vec![0xFF00_00FF]).unwrap();

    let a = PixelBuffer::new_heap_backed(
        HeapStorage::allocate(16).unwrap(),
        indexed(4, 4),
        4,
        Some(Arc::clone(&p)),
    )
    .unwrap();
    let b = PixelBuffer::new_heap_backed(
        HeapStorage::allocate(16).unwrap(),
        indexed(4, 4),
        4,
        Some(Arc::clone(&q)),
    )
    .unwrap();

    b.set_palette(Some(Arc::clone(&r))).unwrap();

    assert!(Arc::ptr_eq(&a.palette().unwrap(), &p));
    assert!(Arc::ptr_eq(&b.palette().unwrap(), &r));
    assert_eq!(p.entries(), &[0xFF00_0000, 0xFFFF_0000]);
    // q is now held only by this test.
    assert_eq!(Arc::strong_count(&q), 1);
}

/// Test that one palette can be shared by several buffers.
#[test]
fn test_palette_shared_between_buffers() {
    let palette = ColorPalette::shared(vec![1, 2, 3, 4]).unwrap();
    let buffers: Vec<_> = (0..3)
        .map(|_| {
            PixelBuffer::new_heap_backed(
                HeapStorage::allocate(4).unwrap(),
                indexed(2, 2),
                2,
                Some(Arc::clone(&palette)),
            )
            .unwrap()
        })
        .collect();
    assert_eq!(Arc::strong_count(&palette), 4);

    drop(buffers);
    assert_eq!(Arc::strong_count(&palette), 1);
}

/// Test that reconfigure replaces the palette reference with the new one.
#[test]
fn test_reconfigure_replaces_palette() {
    let first = ColorPalette::shared(vec![1]).unwrap();
    let second = ColorPalette::shared(vec![2]).unwrap();
    let buffer = PixelBuffer::new_heap_backed(
        HeapStorage::allocate(16).unwrap(),
        indexed(4, 4),
        4,
        Some(first),
    )
    .unwrap();

    buffer
        .reconfigure(indexed(2, 2), None, Some(Arc::clone(&second)))
        .unwrap();
    assert!(Arc::ptr_eq(&buffer.palette().unwrap(), &second));

    let err = buffer.reconfigure(indexed(2, 2), None, None).unwrap_err();
    assert!(matches!(err, Error::MissingPalette(ColorFormat::Index8)));
    assert!(Arc::ptr_eq(&buffer.palette().unwrap(), &second));
}

// ============================================================================
// Backend-specific queries
// ============================================================================

unsafe extern "C" fn ignore_free(_address: *mut c_void, _context: *mut c_void) {}

/// Test that only shared-memory buffers expose a descriptor.
#[test]
fn test_shared_memory_fd_on_other_backends() {
    let heap = PixelBuffer::new_heap_backed(
        HeapStorage::allocate(64).unwrap(),
        ImageDescriptor::rgba(4, 4),
        16,
        None,
    )
    .unwrap();
    match heap.shared_memory_fd() {
        Err(Error::WrongBackend { expected, actual }) => {
            assert_eq!(expected, StorageKind::SharedMemory);
            assert_eq!(actual, StorageKind::Heap);
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let mut pixels = vec![0u8; 64];
    let address = NonNull::new(pixels.as_mut_ptr()).unwrap();
    let storage = unsafe {
        ExternalStorage::from_raw_parts(address, std::ptr::null_mut(), ignore_free, Some(64))
    };
    let external =
        PixelBuffer::new_externally_backed(storage, ImageDescriptor::rgba(4, 4), 16, None)
            .unwrap();
    assert!(external.shared_memory_fd().unwrap_err().is_wrong_backend());
    assert!(external.duplicate_shared_memory_fd().is_err());
}

/// Test that allocation size reports capacity, not the bytes in use.
#[test]
fn test_allocation_byte_size_is_capacity() {
    let buffer = PixelBuffer::new_heap_backed(
        HeapStorage::allocate(1024).unwrap(),
        ImageDescriptor::rgba(4, 4),
        16,
        None,
    )
    .unwrap();
    assert_eq!(buffer.allocation_byte_size(), 1024);
    buffer
        .reconfigure(ImageDescriptor::rgba(2, 2), None, None)
        .unwrap();
    assert_eq!(buffer.allocation_byte_size(), 1024);
    assert_eq!(buffer.lock().byte_len(), 16);
}
