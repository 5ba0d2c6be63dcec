//! Lease categories
//!
//! Each payload type picks one of four ownership disciplines at compile time.
//! The category decides what `acquire` and `release` mean on a control block:
//!
//! | Category     | Concurrent acquire | Release              | Weak refs |
//! |--------------|--------------------|----------------------|-----------|
//! | `Raw`        | yes, uncounted     | terminal immediately | no        |
//! | `Unique`     | no                 | terminal immediately | no        |
//! | `Shared`     | yes, counted       | last one terminal    | no        |
//! | `WeakShared` | yes, counted       | last strong terminal | yes       |

use std::sync::atomic::Ordering;

use crate::error::{Result, TesseraError};
use crate::pool::control::{ControlBlock, GATE_DYING, GATE_FREE, GATE_HELD};

/// Ownership discipline for one pool.
///
/// Implementations are zero-sized markers; the pool routes every control-block
/// transition through them.
pub trait LeaseCategory: Send + Sync + 'static {
    /// Whether weak references exist in this category
    const SUPPORTS_WEAK: bool = false;

    /// First acquisition, right after the control block is bound.
    /// Cannot fail: the block is fresh and unshared.
    fn acquire_initial(cb: &ControlBlock);

    /// Additional acquisition through an existing live handle.
    fn acquire_existing(cb: &ControlBlock) -> Result<()>;

    /// Release one strong reference; returns true when this release is
    /// terminal and the payload must be destroyed.
    fn release(cb: &ControlBlock) -> bool;
}

/// Marker for categories whose strong leases are cloneable
pub trait SharedLeaseCategory: LeaseCategory {}

/// Marker for the category supporting weak leases
pub trait WeakableLeaseCategory: SharedLeaseCategory {}

/// Uncounted ownership: any release is terminal.
///
/// Multiple raw leases on one slot are observers; the caller guarantees a
/// single releasing owner.
pub struct Raw;

/// Exclusive ownership: one lease at a time
pub struct Unique;

/// Reference-counted shared ownership
pub struct Shared;

/// Reference-counted shared ownership with weak references
pub struct WeakShared;

impl LeaseCategory for Raw {
    fn acquire_initial(cb: &ControlBlock) {
        cb.alive_ref().store(true, Ordering::Release);
    }

    fn acquire_existing(cb: &ControlBlock) -> Result<()> {
        if cb.alive_ref().load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TesseraError::handle_expired("raw payload already released"))
        }
    }

    fn release(cb: &ControlBlock) -> bool {
        // swap keeps a second stale release from double-destroying
        cb.alive_ref().swap(false, Ordering::AcqRel)
    }
}

impl LeaseCategory for Unique {
    fn acquire_initial(cb: &ControlBlock) {
        cb.gate_ref().store(GATE_HELD, Ordering::Release);
        cb.alive_ref().store(true, Ordering::Release);
    }

    fn acquire_existing(cb: &ControlBlock) -> Result<()> {
        match cb.gate_ref().compare_exchange(
            GATE_FREE,
            GATE_HELD,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                cb.alive_ref().store(true, Ordering::Release);
                Ok(())
            }
            Err(_) => Err(TesseraError::invalid_state(
                "exclusive payload is already leased",
            )),
        }
    }

    fn release(cb: &ControlBlock) -> bool {
        // HELD -> DYING closes the gate before the slot is recycled, so a
        // racing acquire-by-handle cannot slip in between release and destroy.
        let closed = cb
            .gate_ref()
            .compare_exchange(GATE_HELD, GATE_DYING, Ordering::Release, Ordering::Relaxed)
            .is_ok();
        if closed {
            cb.alive_ref().store(false, Ordering::Release);
        }
        closed
    }
}

fn shared_acquire_existing(cb: &ControlBlock) -> Result<()> {
    // Increment only while the count is non-zero: a zero count means a
    // terminal release is in flight and the payload is dying.
    let mut current = cb.strong_ref().load(Ordering::Acquire);
    loop {
        if current == 0 {
            return Err(TesseraError::handle_expired(
                "shared payload is being destroyed",
            ));
        }
        match cb.strong_ref().compare_exchange_weak(
            current,
            current + 1,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => return Ok(()),
            Err(actual) => current = actual,
        }
    }
}

fn shared_release(cb: &ControlBlock) -> bool {
    if cb.strong_ref().fetch_sub(1, Ordering::AcqRel) == 1 {
        cb.alive_ref().store(false, Ordering::Release);
        true
    } else {
        false
    }
}

impl LeaseCategory for Shared {
    fn acquire_initial(cb: &ControlBlock) {
        cb.strong_ref().fetch_add(1, Ordering::Relaxed);
        cb.alive_ref().store(true, Ordering::Release);
    }

    fn acquire_existing(cb: &ControlBlock) -> Result<()> {
        shared_acquire_existing(cb)
    }

    fn release(cb: &ControlBlock) -> bool {
        shared_release(cb)
    }
}

impl SharedLeaseCategory for Shared {}

impl LeaseCategory for WeakShared {
    const SUPPORTS_WEAK: bool = true;

    fn acquire_initial(cb: &ControlBlock) {
        cb.strong_ref().fetch_add(1, Ordering::Relaxed);
        cb.alive_ref().store(true, Ordering::Release);
    }

    fn acquire_existing(cb: &ControlBlock) -> Result<()> {
        shared_acquire_existing(cb)
    }

    fn release(cb: &ControlBlock) -> bool {
        shared_release(cb)
    }
}

impl SharedLeaseCategory for WeakShared {}
impl WeakableLeaseCategory for WeakShared {}

/// Take one additional strong reference for a cloned lease
pub(crate) fn clone_strong(cb: &ControlBlock) {
    cb.strong_ref().fetch_add(1, Ordering::Relaxed);
}

/// Take a weak reference
pub(crate) fn acquire_weak(cb: &ControlBlock) {
    cb.weak_ref().fetch_add(1, Ordering::Relaxed);
}

/// Release a weak reference; true when this was the last reference of any kind
pub(crate) fn release_weak(cb: &ControlBlock) -> bool {
    let prev = cb.weak_ref().fetch_sub(1, Ordering::AcqRel);
    prev == 1 && cb.strong_ref().load(Ordering::Acquire) == 0
}

/// Promote a weak reference: succeeds only while the strong count is non-zero
pub(crate) fn try_promote(cb: &ControlBlock) -> bool {
    let mut current = cb.strong_ref().load(Ordering::Acquire);
    while current > 0 {
        match cb.strong_ref().compare_exchange_weak(
            current,
            current + 1,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            Ok(_) => {
                cb.alive_ref().store(true, Ordering::Release);
                return true;
            }
            Err(actual) => current = actual,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_release_is_terminal_once() {
        let cb = ControlBlock::default();
        cb.bind(0);
        Raw::acquire_initial(&cb);
        assert!(cb.is_alive());
        assert!(Raw::acquire_existing(&cb).is_ok());

        assert!(Raw::release(&cb));
        assert!(!cb.is_alive());
        assert!(!Raw::release(&cb));
        assert!(Raw::acquire_existing(&cb).is_err());
    }

    #[test]
    fn test_unique_exclusivity() {
        let cb = ControlBlock::default();
        cb.bind(0);
        Unique::acquire_initial(&cb);

        // The slot is held: a second acquire must fail.
        assert!(matches!(
            Unique::acquire_existing(&cb),
            Err(TesseraError::InvalidState { .. })
        ));

        assert!(Unique::release(&cb));
        // Gate is now DYING; nothing can slip in before the pool recycles it.
        assert!(Unique::acquire_existing(&cb).is_err());
        assert!(!Unique::release(&cb));
    }

    #[test]
    fn test_shared_counting() {
        let cb = ControlBlock::default();
        cb.bind(0);
        Shared::acquire_initial(&cb);
        assert_eq!(cb.strong_count(), 1);

        Shared::acquire_existing(&cb).unwrap();
        clone_strong(&cb);
        assert_eq!(cb.strong_count(), 3);

        assert!(!Shared::release(&cb));
        assert!(!Shared::release(&cb));
        assert!(Shared::release(&cb));
        assert_eq!(cb.strong_count(), 0);
        assert!(!cb.is_alive());

        // Count at zero: the payload is dying and cannot be re-acquired.
        assert!(Shared::acquire_existing(&cb).is_err());
    }

    #[test]
    fn test_weak_promote() {
        let cb = ControlBlock::default();
        cb.bind(0);
        WeakShared::acquire_initial(&cb);
        acquire_weak(&cb);
        assert_eq!(cb.weak_count(), 1);

        assert!(try_promote(&cb));
        assert_eq!(cb.strong_count(), 2);
        assert!(!WeakShared::release(&cb));
        assert!(WeakShared::release(&cb));

        // Strong count is zero now; promotion must fail.
        assert!(!try_promote(&cb));
        assert!(release_weak(&cb));
    }

    #[test]
    fn test_weak_release_not_last_while_strong_held() {
        let cb = ControlBlock::default();
        cb.bind(0);
        WeakShared::acquire_initial(&cb);
        acquire_weak(&cb);
        assert!(!release_weak(&cb));
        assert!(WeakShared::release(&cb));
    }
}
