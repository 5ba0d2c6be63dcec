use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera::backend::HostHeapOps;
use tessera::heap::HierarchicalSlotAllocator;

fn benchmark_single_level(c: &mut Criterion) {
    let mut group = c.benchmark_group("HierarchicalSlotAllocator");

    for size in [256usize, 1024, 4096].iter() {
        group.bench_with_input(
            BenchmarkId::new("allocate_deallocate", size),
            size,
            |b, &size| {
                let allocator =
                    HierarchicalSlotAllocator::new(HostHeapOps::default(), vec![4096]).unwrap();
                allocator.add_region(1024 * 1024).unwrap();
                b.iter(|| {
                    let view = allocator.allocate(size).unwrap();
                    allocator.deallocate(view, size).unwrap();
                });
            },
        );
    }

    group.finish();
}

fn benchmark_split_descent(c: &mut Criterion) {
    let mut group = c.benchmark_group("SplitDescent");

    group.bench_function("fine_grained_churn", |b| {
        let allocator =
            HierarchicalSlotAllocator::new(HostHeapOps::default(), vec![4096, 1024, 256])
                .unwrap();
        allocator.add_region(1024 * 1024).unwrap();
        b.iter(|| {
            let views: Vec<_> = (0..16)
                .map(|i| {
                    let size = if i % 3 == 0 { 256 } else { 1024 };
                    (allocator.allocate(size).unwrap(), size)
                })
                .collect();
            for (view, size) in views {
                allocator.deallocate(view, size).unwrap();
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_single_level, benchmark_split_descent);
criterion_main!(benches);
