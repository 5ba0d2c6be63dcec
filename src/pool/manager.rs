//! Pool manager: paired payload and control-block slot pools
//!
//! A [`PoolManager`] owns two slot pools kept 1:1 while a payload lives: one
//! for the payloads themselves and one for the control blocks that carry the
//! lifetime discipline. Callers receive RAII leases; dropping the last strong
//! lease runs the payload's destroy callback and returns both slots to their
//! free lists with the payload generation bumped.
//!
//! Concurrency model: slot reservation and release bookkeeping run under one
//! pool mutex with short critical sections; reference counting on control
//! blocks is lock-free. Nothing here blocks on device completion.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{Result, TesseraError};
use crate::handle::Handle;

use super::block_vec::BlockVec;
use super::category::{self, LeaseCategory, WeakableLeaseCategory};
use super::config::PoolConfig;
use super::control::ControlBlock;
use super::lease::{StrongLease, WeakLease};
use super::slot::PayloadSlot;

/// Compile-time description of one pooled payload type.
///
/// The implementing type doubles as the handle tag, so handles of different
/// payload kinds cannot be confused at compile time.
pub trait PoolSpec: Sized + Send + Sync + 'static {
    /// The pooled resource
    type Payload: Send;
    /// Parameters for creating a payload
    type Request;
    /// Environment the create/destroy callbacks run against (ops tables,
    /// parent handles)
    type Context: Send;
    /// Ownership discipline for leases of this payload
    type Category: LeaseCategory;

    /// Name used in error messages
    const NAME: &'static str;

    /// Validate a request before any slot is consumed by it
    fn validate(_request: &Self::Request) -> Result<()> {
        Ok(())
    }

    /// Build the payload. Failure rolls the slot reservation back fully.
    fn create(request: &Self::Request, context: &Self::Context) -> Result<Self::Payload>;

    /// Tear the payload down. Runs exactly once, on terminal release.
    fn destroy(payload: Self::Payload, context: &Self::Context);
}

/// Mutex-protected pool state
struct PoolState<S: PoolSpec> {
    payloads: BlockVec<PayloadSlot<S::Payload>>,
    payload_free: Vec<u32>,
    controls: BlockVec<ControlBlock>,
    control_free: Vec<u32>,
    /// Control-block storage kept alive across shutdown while weak leases
    /// still point into it
    retired_controls: Vec<BlockVec<ControlBlock>>,
    context: Option<S::Context>,
    config: PoolConfig,
    configured: bool,
}

impl<S: PoolSpec> PoolState<S> {
    fn new() -> Self {
        Self {
            payloads: BlockVec::new(1),
            payload_free: Vec::new(),
            controls: BlockVec::new(1),
            control_free: Vec::new(),
            retired_controls: Vec::new(),
            context: None,
            config: PoolConfig::default(),
            configured: false,
        }
    }
}

/// Shared pool core referenced by the manager and every outstanding lease
pub(crate) struct PoolCore<S: PoolSpec> {
    state: Mutex<PoolState<S>>,
    /// Bumped on shutdown so leases from a previous configuration epoch skip
    /// free-list bookkeeping against the recycled pools
    epoch: AtomicU64,
    outstanding_strong: AtomicUsize,
    outstanding_weak: AtomicUsize,
}

impl<S: PoolSpec> PoolCore<S> {
    fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::new()),
            epoch: AtomicU64::new(0),
            outstanding_strong: AtomicUsize::new(0),
            outstanding_weak: AtomicUsize::new(0),
        }
    }

    /// Strong-lease drop path. Lock-free unless the release is terminal.
    pub(crate) fn release_strong(&self, cb_ptr: NonNull<ControlBlock>, cb_index: u32, epoch: u64) {
        let cb = unsafe { cb_ptr.as_ref() };
        let terminal = S::Category::release(cb);
        self.outstanding_strong.fetch_sub(1, Ordering::AcqRel);
        if !terminal {
            return;
        }

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if self.epoch.load(Ordering::Acquire) != epoch {
            return;
        }

        let payload_index = cb.payload_index() as usize;
        if let Some(slot) = state.payloads.get_mut(payload_index) {
            if let Some(payload) = slot.take() {
                slot.bump_generation();
                if let Some(context) = state.context.as_ref() {
                    S::destroy(payload, context);
                }
                state.payload_free.push(payload_index as u32);
            }
        }

        let returnable = if S::Category::SUPPORTS_WEAK {
            cb.weak_count() == 0
        } else {
            true
        };
        if returnable && !cb.mark_retired() {
            state.control_free.push(cb_index);
        }
    }

    /// Weak-lease drop path
    pub(crate) fn release_weak(&self, cb_ptr: NonNull<ControlBlock>, cb_index: u32, epoch: u64) {
        let cb = unsafe { cb_ptr.as_ref() };
        let last = category::release_weak(cb);
        self.outstanding_weak.fetch_sub(1, Ordering::AcqRel);
        if !last {
            return;
        }

        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if self.epoch.load(Ordering::Acquire) != epoch {
            return;
        }
        if cb.strong_count() == 0 && cb.weak_count() == 0 && !cb.mark_retired() {
            state.control_free.push(cb_index);
        }
    }

    pub(crate) fn bump_weak(&self) {
        self.outstanding_weak.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn bump_strong(&self) {
        self.outstanding_strong.fetch_add(1, Ordering::AcqRel);
    }
}

/// Promote a weak reference into a fresh strong lease.
///
/// Locks the pool so the promotion cannot race shutdown or a concurrent
/// terminal destroy; the counter CAS itself only succeeds while the strong
/// count is non-zero.
pub(crate) fn promote_weak<S: PoolSpec>(
    core: &Arc<PoolCore<S>>,
    cb_ptr: NonNull<ControlBlock>,
    cb_index: u32,
    epoch: u64,
) -> Option<StrongLease<S>> {
    let cb = unsafe { cb_ptr.as_ref() };
    let mut guard = core.state.lock().unwrap();
    let state = &mut *guard;
    if core.epoch.load(Ordering::Acquire) != epoch || !state.configured {
        return None;
    }
    if !category::try_promote(cb) {
        return None;
    }

    let payload_index = cb.payload_index() as usize;
    let slot = state
        .payloads
        .get_mut(payload_index)
        .expect("promoted control block references a payload slot");
    let handle = Handle::new(payload_index as u32, slot.generation());
    let payload_ptr = NonNull::from(
        slot.payload_mut()
            .expect("promoted payload slot is created"),
    );
    core.bump_strong();
    Some(StrongLease::mint(
        Arc::clone(core),
        cb_ptr,
        payload_ptr,
        cb_index,
        handle,
        epoch,
    ))
}

/// Pop a free index, growing the pool by the configured chunk when empty.
fn reserve_index<T: Default>(
    storage: &mut BlockVec<T>,
    free: &mut Vec<u32>,
    capacity: usize,
    growth_chunk_blocks: usize,
    label: &'static str,
) -> Result<u32> {
    if let Some(index) = free.pop() {
        return Ok(index);
    }
    let current = storage.len();
    if current >= capacity {
        return Err(TesseraError::out_of_capacity(label, capacity));
    }
    let additional = (storage.block_size() * growth_chunk_blocks).min(capacity - current);
    storage.grow(additional);
    // Push descending so the lowest fresh index pops first.
    for index in (current..current + additional).rev() {
        free.push(index as u32);
    }
    Ok(free.pop().expect("growth produced at least one slot"))
}

/// Pooled manager for one payload type.
///
/// Cheap to clone; clones share the same pools. All methods take `&self`.
pub struct PoolManager<S: PoolSpec> {
    core: Arc<PoolCore<S>>,
}

impl<S: PoolSpec> Clone for PoolManager<S> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: PoolSpec> Default for PoolManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PoolSpec> PoolManager<S> {
    /// Create an unconfigured manager
    pub fn new() -> Self {
        Self {
            core: Arc::new(PoolCore::new()),
        }
    }

    /// Configure the paired pools and install the create/destroy context.
    ///
    /// Fails with `InvalidArgument` on a zero growth chunk or block size and
    /// with `InvalidState` if already configured.
    pub fn configure(&self, config: PoolConfig, context: S::Context) -> Result<()> {
        config.validate()?;
        let mut guard = self.core.state.lock().unwrap();
        let state = &mut *guard;
        if state.configured {
            return Err(TesseraError::invalid_state(format!(
                "{} is already configured",
                S::NAME
            )));
        }
        if self.core.outstanding_weak.load(Ordering::Acquire) == 0 {
            state.retired_controls.clear();
        }
        state.payloads = BlockVec::new(config.payload_block_size);
        state.controls = BlockVec::new(config.control_block_block_size);
        state.payload_free.clear();
        state.control_free.clear();
        state.config = config;
        state.context = Some(context);
        state.configured = true;
        Ok(())
    }

    /// Tear the pools down.
    ///
    /// Requires that no strong leases are outstanding (`InvalidState`
    /// otherwise). Outstanding weak leases are permitted; their control-block
    /// storage is kept alive and their later promotion attempts return `None`.
    pub fn shutdown(&self) -> Result<()> {
        let mut guard = self.core.state.lock().unwrap();
        let state = &mut *guard;
        if !state.configured {
            return Err(TesseraError::invalid_state(format!(
                "{} is not configured",
                S::NAME
            )));
        }
        if self.core.outstanding_strong.load(Ordering::Acquire) != 0 {
            return Err(TesseraError::invalid_state(format!(
                "{} has outstanding leases at shutdown",
                S::NAME
            )));
        }

        // Leftover created payloads cannot exist without strong leases, but a
        // sweep keeps shutdown total if a payload type misbehaves.
        if let Some(context) = state.context.take() {
            for index in 0..state.payloads.len() {
                if let Some(payload) = state.payloads[index].take() {
                    S::destroy(payload, &context);
                }
            }
        }

        if self.core.outstanding_weak.load(Ordering::Acquire) != 0 {
            let block_size = state.controls.block_size();
            let retired = std::mem::replace(&mut state.controls, BlockVec::new(block_size));
            state.retired_controls.push(retired);
        } else {
            state.controls.clear();
        }
        state.payloads = BlockVec::new(state.config.payload_block_size);
        state.payload_free.clear();
        state.control_free.clear();
        state.configured = false;
        self.core.epoch.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Whether the manager has been configured
    pub fn is_configured(&self) -> bool {
        self.core.state.lock().unwrap().configured
    }

    /// Create a payload and lease it.
    ///
    /// Reserves an uncreated slot (growing on demand), validates the request,
    /// runs the create callback, binds a control block, and returns the
    /// strong lease. Any intermediate failure rolls the reservation back.
    pub fn acquire(&self, request: &S::Request) -> Result<StrongLease<S>> {
        let mut guard = self.core.state.lock().unwrap();
        let state = &mut *guard;
        if !state.configured {
            return Err(TesseraError::not_configured(S::NAME));
        }

        let payload_index = reserve_index(
            &mut state.payloads,
            &mut state.payload_free,
            state.config.payload_capacity,
            state.config.payload_growth_chunk_size,
            S::NAME,
        )?;

        if let Err(err) = S::validate(request) {
            state.payload_free.push(payload_index);
            return Err(err);
        }

        let context = state.context.as_ref().expect("configured pool has context");
        let payload = match S::create(request, context) {
            Ok(payload) => payload,
            Err(err) => {
                state.payload_free.push(payload_index);
                return Err(err);
            }
        };

        let cb_index = match reserve_index(
            &mut state.controls,
            &mut state.control_free,
            state.config.control_block_capacity,
            state.config.control_block_growth_chunk_size,
            S::NAME,
        ) {
            Ok(index) => index,
            Err(err) => {
                S::destroy(payload, context);
                state.payload_free.push(payload_index);
                return Err(err);
            }
        };

        let slot = &mut state.payloads[payload_index as usize];
        slot.install(payload, cb_index);
        let handle = Handle::new(payload_index, slot.generation());
        let payload_ptr = NonNull::from(slot.payload_mut().expect("payload just installed"));

        let cb = &state.controls[cb_index as usize];
        cb.bind(payload_index);
        S::Category::acquire_initial(cb);
        let cb_ptr = NonNull::from(cb);

        self.core.bump_strong();
        Ok(StrongLease::mint(
            Arc::clone(&self.core),
            cb_ptr,
            payload_ptr,
            cb_index,
            handle,
            self.core.epoch.load(Ordering::Acquire),
        ))
    }

    /// Lease an already-live payload through its handle.
    ///
    /// Fails with `HandleExpired` when the generation mismatches or the slot
    /// is uncreated, and with the category's own error when the discipline
    /// forbids another lease (e.g. `InvalidState` for Unique).
    pub fn acquire_handle(&self, handle: Handle<S>) -> Result<StrongLease<S>> {
        let mut guard = self.core.state.lock().unwrap();
        let state = &mut *guard;
        if !state.configured {
            return Err(TesseraError::not_configured(S::NAME));
        }

        let index = handle.index() as usize;
        let slot = state
            .payloads
            .get(index)
            .ok_or_else(|| TesseraError::handle_expired("slot index out of range"))?;
        if !slot.is_created() || slot.generation() != handle.generation() {
            return Err(TesseraError::handle_expired(format!(
                "{} handle does not reference a live slot",
                S::NAME
            )));
        }
        let cb_index = slot.control();

        let cb = &state.controls[cb_index as usize];
        S::Category::acquire_existing(cb)?;
        let cb_ptr = NonNull::from(cb);

        let payload_ptr = NonNull::from(
            state.payloads[index]
                .payload_mut()
                .expect("live slot has a payload"),
        );
        self.core.bump_strong();
        Ok(StrongLease::mint(
            Arc::clone(&self.core),
            cb_ptr,
            payload_ptr,
            cb_index,
            handle,
            self.core.epoch.load(Ordering::Acquire),
        ))
    }

    /// Whether a handle references a live slot
    pub fn is_alive(&self, handle: Handle<S>) -> bool {
        let guard = self.core.state.lock().unwrap();
        guard
            .payloads
            .get(handle.index() as usize)
            .map(|slot| slot.is_created() && slot.generation() == handle.generation())
            .unwrap_or(false)
    }

    /// Number of outstanding strong leases
    pub fn outstanding_strong(&self) -> usize {
        self.core.outstanding_strong.load(Ordering::Acquire)
    }

    /// Number of outstanding weak leases
    pub fn outstanding_weak(&self) -> usize {
        self.core.outstanding_weak.load(Ordering::Acquire)
    }

    /// Number of payload slots currently allocated (live or free)
    pub fn payload_slot_count(&self) -> usize {
        self.core.state.lock().unwrap().payloads.len()
    }

    /// Number of payload slots on the free list
    pub fn free_payload_count(&self) -> usize {
        self.core.state.lock().unwrap().payload_free.len()
    }

    /// Number of control-block slots on the free list
    pub fn free_control_count(&self) -> usize {
        self.core.state.lock().unwrap().control_free.len()
    }

    /// Current generation of a payload slot, if allocated
    pub fn slot_generation(&self, index: u32) -> Option<u32> {
        self.core
            .state
            .lock()
            .unwrap()
            .payloads
            .get(index as usize)
            .map(|slot| slot.generation())
    }
}

impl<S: PoolSpec> PoolManager<S>
where
    S::Category: WeakableLeaseCategory,
{
    /// Take a weak lease on a live payload without a strong reference.
    pub fn acquire_weak(&self, handle: Handle<S>) -> Result<WeakLease<S>> {
        let mut guard = self.core.state.lock().unwrap();
        let state = &mut *guard;
        if !state.configured {
            return Err(TesseraError::not_configured(S::NAME));
        }
        let index = handle.index() as usize;
        let slot = state
            .payloads
            .get(index)
            .ok_or_else(|| TesseraError::handle_expired("slot index out of range"))?;
        if !slot.is_created() || slot.generation() != handle.generation() {
            return Err(TesseraError::handle_expired(format!(
                "{} handle does not reference a live slot",
                S::NAME
            )));
        }
        let cb_index = slot.control();
        let cb = &state.controls[cb_index as usize];
        category::acquire_weak(cb);
        let cb_ptr = NonNull::from(cb);
        self.core.bump_weak();
        Ok(WeakLease::mint(
            Arc::clone(&self.core),
            cb_ptr,
            cb_index,
            self.core.epoch.load(Ordering::Acquire),
        ))
    }
}

impl<S: PoolSpec> std::fmt::Debug for PoolManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("name", &S::NAME)
            .field("configured", &self.is_configured())
            .field("outstanding_strong", &self.outstanding_strong())
            .finish()
    }
}
