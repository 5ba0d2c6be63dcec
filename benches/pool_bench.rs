use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tessera::error::Result;
use tessera::pool::{PoolConfig, PoolManager, PoolSpec, Shared, Unique};

struct Payload {
    value: u64,
}

#[derive(Clone, Copy)]
struct Request {
    value: u64,
}

struct SharedSpec;

impl PoolSpec for SharedSpec {
    type Payload = Payload;
    type Request = Request;
    type Context = ();
    type Category = Shared;

    const NAME: &'static str = "bench shared pool";

    fn create(request: &Request, _context: &()) -> Result<Payload> {
        Ok(Payload {
            value: request.value,
        })
    }

    fn destroy(_payload: Payload, _context: &()) {}
}

struct UniqueSpec;

impl PoolSpec for UniqueSpec {
    type Payload = Payload;
    type Request = Request;
    type Context = ();
    type Category = Unique;

    const NAME: &'static str = "bench unique pool";

    fn create(request: &Request, _context: &()) -> Result<Payload> {
        Ok(Payload {
            value: request.value,
        })
    }

    fn destroy(_payload: Payload, _context: &()) {}
}

fn benchmark_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("PoolManager");

    group.bench_function("acquire_release_shared", |b| {
        let manager = PoolManager::<SharedSpec>::new();
        manager
            .configure(PoolConfig::default().with_capacity(1024), ())
            .unwrap();
        b.iter(|| {
            let lease = manager.acquire(&Request { value: 1 }).unwrap();
            std::hint::black_box(lease.value);
        });
    });

    group.bench_function("acquire_release_unique", |b| {
        let manager = PoolManager::<UniqueSpec>::new();
        manager
            .configure(PoolConfig::default().with_capacity(1024), ())
            .unwrap();
        b.iter(|| {
            let lease = manager.acquire(&Request { value: 1 }).unwrap();
            std::hint::black_box(lease.value);
        });
    });

    group.finish();
}

fn benchmark_clone_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("LeaseClone");

    for clones in [1usize, 4, 16].iter() {
        group.bench_with_input(
            BenchmarkId::new("clone_drop", clones),
            clones,
            |b, &clones| {
                let manager = PoolManager::<SharedSpec>::new();
                manager
                    .configure(PoolConfig::default().with_capacity(64), ())
                    .unwrap();
                let root = manager.acquire(&Request { value: 7 }).unwrap();
                b.iter(|| {
                    let leases: Vec<_> = (0..clones).map(|_| root.clone()).collect();
                    std::hint::black_box(leases.len());
                });
            },
        );
    }

    group.finish();
}

fn benchmark_acquire_by_handle(c: &mut Criterion) {
    let mut group = c.benchmark_group("HandleResolve");

    group.bench_function("acquire_handle", |b| {
        let manager = PoolManager::<SharedSpec>::new();
        manager
            .configure(PoolConfig::default().with_capacity(64), ())
            .unwrap();
        let root = manager.acquire(&Request { value: 7 }).unwrap();
        let handle = root.handle();
        b.iter(|| {
            let lease = manager.acquire_handle(handle).unwrap();
            std::hint::black_box(lease.value);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_acquire_release,
    benchmark_clone_contention,
    benchmark_acquire_by_handle
);
criterion_main!(benches);
