//! Lock and reconfigure benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use pixel_storage::allocator::{allocate_heap_buffer, allocate_shared_memory_buffer};
use pixel_storage::config::AllocationOptions;
use pixel_storage::format::ImageDescriptor;
use std::sync::Arc;

fn bench_lock_unlock(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_unlock");
    let options = AllocationOptions::default();

    let heap = allocate_heap_buffer(ImageDescriptor::rgba(256, 256), None, &options).unwrap();
    let shared =
        allocate_shared_memory_buffer(ImageDescriptor::rgba(256, 256), None, &options).unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("heap_shared_lock", |b| {
        b.iter(|| {
            let lock = heap.lock();
            std::hint::black_box(lock.as_ptr());
        });
    });
    group.bench_function("shared_memory_exclusive_lock", |b| {
        b.iter(|| {
            let mut lock = shared.lock_mut();
            std::hint::black_box(lock.as_mut_ptr());
        });
    });

    group.finish();
}

fn bench_reconfigure(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconfigure");
    let options = AllocationOptions::default();
    let buffer = allocate_heap_buffer(ImageDescriptor::rgba(256, 256), None, &options).unwrap();

    group.throughput(Throughput::Elements(1));
    group.bench_function("alternate_descriptors", |b| {
        let mut flip = false;
        b.iter(|| {
            flip = !flip;
            let desc = if flip {
                ImageDescriptor::rgba(128, 512)
            } else {
                ImageDescriptor::rgba(256, 256)
            };
            buffer.reconfigure(desc, None, None).unwrap();
        });
    });

    group.finish();
}

fn bench_contended_lock(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_lock");
    let options = AllocationOptions::default();
    let buffer =
        Arc::new(allocate_heap_buffer(ImageDescriptor::rgba(64, 64), None, &options).unwrap());

    for threads in [2, 4, 8] {
        group.throughput(Throughput::Elements(threads as u64 * 100));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let buffer = Arc::clone(&buffer);
                        std::thread::spawn(move || {
                            for _ in 0..100 {
                                let lock = buffer.lock();
                                std::hint::black_box(lock.row_stride());
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_lock_unlock,
    bench_reconfigure,
    bench_contended_lock
);
criterion_main!(benches);
