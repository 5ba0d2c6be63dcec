//! Pool manager tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Result, TesseraError};
use crate::pool::category::{Raw, Shared, Unique, WeakShared};
use crate::pool::config::PoolConfig;
use crate::pool::manager::{PoolManager, PoolSpec};

/// Shared counters observed by the create/destroy callbacks
#[derive(Debug, Default, Clone)]
struct Counters {
    created: Arc<AtomicUsize>,
    destroyed: Arc<AtomicUsize>,
    fail_create: Arc<AtomicBool>,
}

impl Counters {
    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct Widget {
    value: u64,
}

#[derive(Debug, Clone, Copy)]
struct WidgetRequest {
    value: u64,
}

macro_rules! widget_spec {
    ($name:ident, $category:ty, $label:literal) => {
        struct $name;

        impl PoolSpec for $name {
            type Payload = Widget;
            type Request = WidgetRequest;
            type Context = Counters;
            type Category = $category;

            const NAME: &'static str = $label;

            fn validate(request: &WidgetRequest) -> Result<()> {
                if request.value == u64::MAX {
                    return Err(TesseraError::invalid_argument("value", "sentinel rejected"));
                }
                Ok(())
            }

            fn create(request: &WidgetRequest, context: &Counters) -> Result<Widget> {
                if context.fail_create.load(Ordering::SeqCst) {
                    return Err(TesseraError::invalid_state("create callback refused"));
                }
                context.created.fetch_add(1, Ordering::SeqCst);
                Ok(Widget {
                    value: request.value,
                })
            }

            fn destroy(_payload: Widget, context: &Counters) {
                context.destroyed.fetch_add(1, Ordering::SeqCst);
            }
        }
    };
}

widget_spec!(SharedWidget, Shared, "shared widget pool");
widget_spec!(UniqueWidget, Unique, "unique widget pool");
widget_spec!(RawWidget, Raw, "raw widget pool");
widget_spec!(WeakWidget, WeakShared, "weak widget pool");

fn configured<S>(config: PoolConfig) -> (PoolManager<S>, Counters)
where
    S: PoolSpec<Request = WidgetRequest, Context = Counters>,
{
    let manager = PoolManager::<S>::new();
    let counters = Counters::default();
    manager.configure(config, counters.clone()).unwrap();
    (manager, counters)
}

fn small_config() -> PoolConfig {
    PoolConfig::default()
        .with_capacity(4)
        .with_block_size(2)
        .with_growth_chunk_size(1)
}

#[test]
fn test_acquire_and_drop_round_trip() {
    let (manager, counters) = configured::<SharedWidget>(small_config());

    let lease = manager.acquire(&WidgetRequest { value: 42 }).unwrap();
    assert_eq!(lease.value, 42);
    assert_eq!(lease.handle().index(), 0);
    assert_eq!(lease.handle().generation(), 1);
    assert!(manager.is_alive(lease.handle()));
    assert_eq!(manager.outstanding_strong(), 1);

    let free_before_drop = manager.free_payload_count();
    drop(lease);

    assert_eq!(counters.created(), 1);
    assert_eq!(counters.destroyed(), 1);
    assert_eq!(manager.outstanding_strong(), 0);
    assert_eq!(manager.free_payload_count(), free_before_drop + 1);
    // Release bumped the generation exactly once.
    assert_eq!(manager.slot_generation(0), Some(2));
}

#[test]
fn test_shared_lifecycle_with_clone_and_reuse() {
    let config = PoolConfig::default()
        .with_payload_capacity(2)
        .with_block_size(2);
    let (manager, counters) = configured::<SharedWidget>(config);

    let a = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    assert_eq!((a.handle().index(), a.handle().generation()), (0, 1));
    let b = manager.acquire(&WidgetRequest { value: 2 }).unwrap();
    assert_eq!((b.handle().index(), b.handle().generation()), (1, 1));

    let c = a.clone();
    assert_eq!(c.strong_count(), 2);

    drop(a);
    assert_eq!(counters.destroyed(), 0);

    drop(c);
    assert_eq!(counters.destroyed(), 1);
    assert_eq!(manager.slot_generation(0), Some(2));

    // Freed index 0 is reused with the bumped generation.
    let d = manager.acquire(&WidgetRequest { value: 3 }).unwrap();
    assert_eq!((d.handle().index(), d.handle().generation()), (0, 2));
}

#[test]
fn test_acquire_handle_refcounts() {
    let (manager, counters) = configured::<SharedWidget>(small_config());

    let a = manager.acquire(&WidgetRequest { value: 9 }).unwrap();
    let b = manager.acquire_handle(a.handle()).unwrap();
    assert_eq!(a.strong_count(), 2);
    assert_eq!(b.value, 9);

    drop(a);
    assert_eq!(counters.destroyed(), 0);
    drop(b);
    assert_eq!(counters.destroyed(), 1);
}

#[test]
fn test_expired_handle_rejected() {
    let (manager, _counters) = configured::<SharedWidget>(small_config());

    let lease = manager.acquire(&WidgetRequest { value: 5 }).unwrap();
    let stale = lease.handle();
    drop(lease);

    assert!(!manager.is_alive(stale));
    let err = manager.acquire_handle(stale).unwrap_err();
    assert!(matches!(err, TesseraError::HandleExpired { .. }));

    // A fresh occupant of the same index does not resurrect the old handle.
    let fresh = manager.acquire(&WidgetRequest { value: 6 }).unwrap();
    assert_eq!(fresh.handle().index(), stale.index());
    assert!(manager.acquire_handle(stale).is_err());
}

#[test]
fn test_validation_failure_rolls_back() {
    let (manager, counters) = configured::<SharedWidget>(small_config());

    let err = manager.acquire(&WidgetRequest { value: u64::MAX }).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidArgument { .. }));
    assert_eq!(counters.created(), 0);
    assert_eq!(manager.outstanding_strong(), 0);

    // The reserved slot went back on the free list.
    let lease = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    assert_eq!(lease.handle().index(), 0);
}

#[test]
fn test_create_failure_rolls_back() {
    let (manager, counters) = configured::<SharedWidget>(small_config());
    counters.fail_create.store(true, Ordering::SeqCst);

    let err = manager.acquire(&WidgetRequest { value: 1 }).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidState { .. }));
    assert_eq!(counters.created(), 0);

    counters.fail_create.store(false, Ordering::SeqCst);
    let lease = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    assert_eq!(lease.handle().index(), 0);
}

#[test]
fn test_capacity_exhaustion() {
    let config = PoolConfig::default()
        .with_payload_capacity(2)
        .with_block_size(1);
    let (manager, _counters) = configured::<SharedWidget>(config);

    let _a = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let _b = manager.acquire(&WidgetRequest { value: 2 }).unwrap();
    let err = manager.acquire(&WidgetRequest { value: 3 }).unwrap_err();
    assert!(matches!(err, TesseraError::OutOfCapacity { .. }));
}

#[test]
fn test_unique_exclusive_acquire() {
    let (manager, counters) = configured::<UniqueWidget>(small_config());

    let a = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let err = manager.acquire_handle(a.handle()).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidState { .. }));

    let handle = a.handle();
    drop(a);
    assert_eq!(counters.destroyed(), 1);
    // Released and recycled: the old handle is expired, not re-acquirable.
    assert!(manager.acquire_handle(handle).is_err());
}

#[test]
fn test_raw_release_is_terminal() {
    let (manager, counters) = configured::<RawWidget>(small_config());

    let a = manager.acquire(&WidgetRequest { value: 7 }).unwrap();
    let observer = manager.acquire_handle(a.handle()).unwrap();
    drop(a);
    assert_eq!(counters.destroyed(), 1);
    // The observer's later drop must not destroy again.
    drop(observer);
    assert_eq!(counters.destroyed(), 1);
}

#[test]
fn test_weak_promote_lifecycle() {
    let (manager, counters) = configured::<WeakWidget>(small_config());

    let strong = manager.acquire(&WidgetRequest { value: 11 }).unwrap();
    let weak = strong.downgrade();
    assert_eq!(weak.weak_count(), 1);

    {
        let promoted = weak.try_promote().expect("strong lease still live");
        assert_eq!(promoted.value, 11);
        assert_eq!(promoted.strong_count(), 2);
    }

    drop(strong);
    assert_eq!(counters.destroyed(), 1);

    assert!(weak.try_promote().is_none());
    let free_controls = manager.free_control_count();
    drop(weak);
    // Both counts zero: the control block finally returns to the free list.
    assert_eq!(manager.free_control_count(), free_controls + 1);
}

#[test]
fn test_acquire_weak_by_handle() {
    let (manager, _counters) = configured::<WeakWidget>(small_config());

    let strong = manager.acquire(&WidgetRequest { value: 3 }).unwrap();
    let weak = manager.acquire_weak(strong.handle()).unwrap();
    assert_eq!(weak.strong_count(), 1);
    drop(strong);
    assert!(weak.try_promote().is_none());
}

#[test]
fn test_shutdown_rejects_outstanding_leases() {
    let (manager, _counters) = configured::<SharedWidget>(small_config());

    let lease = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let err = manager.shutdown().unwrap_err();
    assert!(matches!(err, TesseraError::InvalidState { .. }));

    drop(lease);
    manager.shutdown().unwrap();
    assert!(!manager.is_configured());
}

#[test]
fn test_reconfigure_after_shutdown_is_fresh() {
    let (manager, counters) = configured::<SharedWidget>(small_config());

    let lease = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    drop(lease);
    manager.shutdown().unwrap();

    manager.configure(small_config(), counters.clone()).unwrap();
    let lease = manager.acquire(&WidgetRequest { value: 2 }).unwrap();
    // Indistinguishable from a fresh pool: slot 0, generation 1.
    assert_eq!(lease.handle().index(), 0);
    assert_eq!(lease.handle().generation(), 1);
}

#[test]
fn test_weak_lease_survives_shutdown() {
    let (manager, _counters) = configured::<WeakWidget>(small_config());

    let strong = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let weak = strong.downgrade();
    drop(strong);

    manager.shutdown().unwrap();
    assert!(weak.try_promote().is_none());
    drop(weak);
    assert_eq!(manager.outstanding_weak(), 0);
}

#[test]
fn test_unconfigured_operations_fail() {
    let manager = PoolManager::<SharedWidget>::new();
    let err = manager.acquire(&WidgetRequest { value: 1 }).unwrap_err();
    assert!(matches!(err, TesseraError::NotConfigured { .. }));
    assert!(manager.shutdown().is_err());
}

#[test]
fn test_double_configure_rejected() {
    let (manager, counters) = configured::<SharedWidget>(small_config());
    let err = manager.configure(small_config(), counters).unwrap_err();
    assert!(matches!(err, TesseraError::InvalidState { .. }));
}

#[test]
fn test_concurrent_shared_acquire_release() {
    let config = PoolConfig::default().with_capacity(64).with_block_size(8);
    let (manager, counters) = configured::<SharedWidget>(config);

    let root = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let handle = root.handle();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let lease = manager.acquire_handle(handle).unwrap();
                    assert_eq!(lease.value, 1);
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(root.strong_count(), 1);
    drop(root);
    // N acquires and N releases: destroy ran exactly once.
    assert_eq!(counters.destroyed(), 1);
}

#[test]
fn test_concurrent_unique_single_winner() {
    let (manager, _counters) = configured::<UniqueWidget>(small_config());
    let lease = manager.acquire(&WidgetRequest { value: 1 }).unwrap();
    let handle = lease.handle();
    // Hold the lease on the main thread; all contenders must lose.
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            std::thread::spawn(move || manager.acquire_handle(handle).is_ok())
        })
        .collect();
    let winners = threads
        .into_iter()
        .map(|t| t.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 0);
    drop(lease);
}
