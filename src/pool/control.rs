//! Control block storage
//!
//! A control block carries the lifetime-discipline state for one live payload
//! slot. Everything mutated after binding is atomic, so leases may drive
//! acquire/release through a shared reference without the pool mutex.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::handle::INVALID_INDEX;

/// Occupancy gate values for exclusive (Unique) payloads
pub(crate) const GATE_FREE: u32 = 0;
pub(crate) const GATE_HELD: u32 = 1;
pub(crate) const GATE_DYING: u32 = 2;

/// Lifetime controller bound 1:1 to a live payload slot.
///
/// The interpretation of the counters depends on the pool's lease category:
/// Raw ignores both counts, Unique uses only the gate, Shared uses the strong
/// count, WeakShared uses both counts. `retired` arbitrates which releasing
/// thread returns this block to its free list.
#[derive(Debug)]
pub struct ControlBlock {
    strong: AtomicU32,
    weak: AtomicU32,
    gate: AtomicU32,
    alive: AtomicBool,
    retired: AtomicBool,
    payload_index: AtomicU32,
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self {
            strong: AtomicU32::new(0),
            weak: AtomicU32::new(0),
            gate: AtomicU32::new(GATE_FREE),
            alive: AtomicBool::new(false),
            retired: AtomicBool::new(false),
            payload_index: AtomicU32::new(INVALID_INDEX),
        }
    }
}

impl ControlBlock {
    /// Rebind this block to a fresh payload slot.
    ///
    /// Called under the pool mutex before any lease references the block.
    pub(crate) fn bind(&self, payload_index: u32) {
        self.strong.store(0, Ordering::Relaxed);
        self.weak.store(0, Ordering::Relaxed);
        self.gate.store(GATE_FREE, Ordering::Relaxed);
        self.alive.store(false, Ordering::Relaxed);
        self.retired.store(false, Ordering::Relaxed);
        self.payload_index.store(payload_index, Ordering::Release);
    }

    /// Index of the payload slot this block controls
    pub fn payload_index(&self) -> u32 {
        self.payload_index.load(Ordering::Acquire)
    }

    /// Current strong reference count
    pub fn strong_count(&self) -> u32 {
        self.strong.load(Ordering::Acquire)
    }

    /// Current weak reference count
    pub fn weak_count(&self) -> u32 {
        self.weak.load(Ordering::Acquire)
    }

    /// Whether the controlled payload is currently acquired
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark retired; returns true if it was already retired.
    ///
    /// Serialized by the pool mutex; decides which releasing thread returns
    /// the block to the free list.
    pub(crate) fn mark_retired(&self) -> bool {
        self.retired.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn strong_ref(&self) -> &AtomicU32 {
        &self.strong
    }

    pub(crate) fn weak_ref(&self) -> &AtomicU32 {
        &self.weak
    }

    pub(crate) fn gate_ref(&self) -> &AtomicU32 {
        &self.gate
    }

    pub(crate) fn alive_ref(&self) -> &AtomicBool {
        &self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_resets_state() {
        let cb = ControlBlock::default();
        cb.strong.store(3, Ordering::Relaxed);
        cb.weak.store(2, Ordering::Relaxed);
        cb.alive.store(true, Ordering::Relaxed);
        cb.retired.store(true, Ordering::Relaxed);

        cb.bind(9);
        assert_eq!(cb.strong_count(), 0);
        assert_eq!(cb.weak_count(), 0);
        assert!(!cb.is_alive());
        assert!(!cb.mark_retired());
        assert!(cb.mark_retired());
        assert_eq!(cb.payload_index(), 9);
    }
}
