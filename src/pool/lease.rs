//! RAII leases
//!
//! Leases are minted only by their pool manager; the constructors are not
//! public, so the module boundary enforces what the original design kept
//! behind restricted constructors. A strong lease caches the payload pointer
//! at acquisition time, so payload access never touches the pool mutex.

use std::fmt;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::handle::Handle;

use super::category::{self, SharedLeaseCategory, WeakableLeaseCategory};
use super::control::ControlBlock;
use super::manager::{promote_weak, PoolCore, PoolSpec};

/// Strong RAII lease: counts against the pool's live set.
///
/// Move-only; cloneable only for shared categories. Dropping releases the
/// control block, and the terminal release destroys the payload and returns
/// both slots to their free lists.
pub struct StrongLease<S: PoolSpec> {
    core: Arc<PoolCore<S>>,
    cb: NonNull<ControlBlock>,
    payload: NonNull<S::Payload>,
    cb_index: u32,
    handle: Handle<S>,
    epoch: u64,
}

impl<S: PoolSpec> StrongLease<S> {
    pub(crate) fn mint(
        core: Arc<PoolCore<S>>,
        cb: NonNull<ControlBlock>,
        payload: NonNull<S::Payload>,
        cb_index: u32,
        handle: Handle<S>,
        epoch: u64,
    ) -> Self {
        Self {
            core,
            cb,
            payload,
            cb_index,
            handle,
            epoch,
        }
    }

    /// Handle of the leased payload slot
    pub fn handle(&self) -> Handle<S> {
        self.handle
    }

    /// Shared access to the payload
    pub fn payload(&self) -> &S::Payload {
        // Valid while this lease holds its strong reference: the payload is
        // only destroyed on terminal release, and block storage never moves.
        unsafe { self.payload.as_ref() }
    }

    /// Whether the control block still reports the payload as acquired
    pub fn is_alive(&self) -> bool {
        self.control().is_alive()
    }

    /// Current strong count on the control block
    pub fn strong_count(&self) -> u32 {
        self.control().strong_count()
    }

    fn control(&self) -> &ControlBlock {
        unsafe { self.cb.as_ref() }
    }
}

impl<S: PoolSpec> StrongLease<S>
where
    S::Category: WeakableLeaseCategory,
{
    /// Take a weak observer reference alongside this lease
    pub fn downgrade(&self) -> WeakLease<S> {
        category::acquire_weak(self.control());
        self.core.bump_weak();
        WeakLease::mint(
            Arc::clone(&self.core),
            self.cb,
            self.cb_index,
            self.epoch,
        )
    }
}

impl<S: PoolSpec> Deref for StrongLease<S> {
    type Target = S::Payload;

    fn deref(&self) -> &S::Payload {
        self.payload()
    }
}

impl<S: PoolSpec> Clone for StrongLease<S>
where
    S::Category: SharedLeaseCategory,
{
    fn clone(&self) -> Self {
        category::clone_strong(self.control());
        self.core.bump_strong();
        Self {
            core: Arc::clone(&self.core),
            cb: self.cb,
            payload: self.payload,
            cb_index: self.cb_index,
            handle: self.handle,
            epoch: self.epoch,
        }
    }
}

impl<S: PoolSpec> Drop for StrongLease<S> {
    fn drop(&mut self) {
        self.core.release_strong(self.cb, self.cb_index, self.epoch);
    }
}

impl<S: PoolSpec> fmt::Debug for StrongLease<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrongLease")
            .field("pool", &S::NAME)
            .field("handle", &self.handle)
            .field("strong", &self.strong_count())
            .finish()
    }
}

// Payload access is shared (&Payload) and may happen from any thread holding
// the lease or a clone, so both bounds require Sync on the payload.
unsafe impl<S: PoolSpec> Send for StrongLease<S> where S::Payload: Send + Sync {}
unsafe impl<S: PoolSpec> Sync for StrongLease<S> where S::Payload: Send + Sync {}

/// Weak observer lease: does not keep the payload alive.
///
/// Must be promoted before use; promotion fails once the last strong lease
/// has dropped or the pool has been shut down.
pub struct WeakLease<S: PoolSpec> {
    core: Arc<PoolCore<S>>,
    cb: NonNull<ControlBlock>,
    cb_index: u32,
    epoch: u64,
}

impl<S: PoolSpec> WeakLease<S> {
    pub(crate) fn mint(
        core: Arc<PoolCore<S>>,
        cb: NonNull<ControlBlock>,
        cb_index: u32,
        epoch: u64,
    ) -> Self {
        Self {
            core,
            cb,
            cb_index,
            epoch,
        }
    }

    /// Try to promote to a strong lease; `None` once the payload is gone
    pub fn try_promote(&self) -> Option<StrongLease<S>> {
        promote_weak(&self.core, self.cb, self.cb_index, self.epoch)
    }

    /// Current strong count on the observed control block
    pub fn strong_count(&self) -> u32 {
        self.control().strong_count()
    }

    /// Current weak count on the observed control block
    pub fn weak_count(&self) -> u32 {
        self.control().weak_count()
    }

    fn control(&self) -> &ControlBlock {
        unsafe { self.cb.as_ref() }
    }
}

impl<S: PoolSpec> Clone for WeakLease<S> {
    fn clone(&self) -> Self {
        category::acquire_weak(self.control());
        self.core.bump_weak();
        Self {
            core: Arc::clone(&self.core),
            cb: self.cb,
            cb_index: self.cb_index,
            epoch: self.epoch,
        }
    }
}

impl<S: PoolSpec> Drop for WeakLease<S> {
    fn drop(&mut self) {
        self.core.release_weak(self.cb, self.cb_index, self.epoch);
    }
}

impl<S: PoolSpec> fmt::Debug for WeakLease<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakLease")
            .field("pool", &S::NAME)
            .field("strong", &self.strong_count())
            .field("weak", &self.weak_count())
            .finish()
    }
}

unsafe impl<S: PoolSpec> Send for WeakLease<S> where S::Payload: Send + Sync {}
unsafe impl<S: PoolSpec> Sync for WeakLease<S> where S::Payload: Send + Sync {}
