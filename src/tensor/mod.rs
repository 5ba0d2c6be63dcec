//! Dense tensor implementations
//!
//! A tensor impl pairs a type-erased storage lease with its element count and
//! type. Tensor impls use weak-shared leases: views and caches observe an
//! impl weakly and promote on use, so a cache entry never keeps a destroyed
//! tensor alive.

use crate::backend::Execution;
use crate::dtype::DType;
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, StrongLease, WeakLease, WeakShared};
use crate::storage::AnyStorageLease;

pub type DenseTensorHandle = Handle<DenseTensorSpec>;
pub type DenseTensorLease = StrongLease<DenseTensorSpec>;
pub type DenseTensorWeakLease = WeakLease<DenseTensorSpec>;

/// One dense tensor implementation
#[derive(Debug)]
pub struct DenseTensorImpl {
    storage: AnyStorageLease,
    numel: usize,
    dtype: DType,
    execution: Execution,
}

impl DenseTensorImpl {
    pub fn storage(&self) -> &AnyStorageLease {
        &self.storage
    }

    pub fn numel(&self) -> usize {
        self.numel
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }
}

/// Request for minting a tensor impl over an existing storage lease
#[derive(Debug, Clone)]
pub struct DenseTensorRequest {
    pub storage: AnyStorageLease,
}

pub struct DenseTensorSpec;

impl PoolSpec for DenseTensorSpec {
    type Payload = DenseTensorImpl;
    type Request = DenseTensorRequest;
    type Context = ();
    type Category = WeakShared;

    const NAME: &'static str = "dense tensor manager";

    fn validate(request: &DenseTensorRequest) -> Result<()> {
        if !request.storage.valid() {
            return Err(TesseraError::invalid_argument(
                "storage",
                "tensor impl requires a valid storage lease",
            ));
        }
        Ok(())
    }

    fn create(request: &DenseTensorRequest, _context: &()) -> Result<DenseTensorImpl> {
        let storage = request.storage.clone();
        let resource = storage
            .storage()
            .expect("validated storage lease has a payload");
        Ok(DenseTensorImpl {
            numel: resource.numel(),
            dtype: resource.dtype(),
            execution: storage.execution(),
            storage,
        })
    }

    fn destroy(_payload: DenseTensorImpl, _context: &()) {
        // The held storage lease releases on drop.
    }
}

/// Tensor-impl manager with weak-shared leases
#[derive(Clone, Default)]
pub struct DenseTensorManager {
    pool: PoolManager<DenseTensorSpec>,
}

impl DenseTensorManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&self, config: PoolConfig) -> Result<()> {
        self.pool.configure(config, ())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, request: &DenseTensorRequest) -> Result<DenseTensorLease> {
        self.pool.acquire(request)
    }

    pub fn acquire_handle(&self, handle: DenseTensorHandle) -> Result<DenseTensorLease> {
        self.pool.acquire_handle(handle)
    }

    /// Observe a live tensor impl without keeping it alive
    pub fn acquire_weak(&self, handle: DenseTensorHandle) -> Result<DenseTensorWeakLease> {
        self.pool.acquire_weak(handle)
    }

    pub fn is_alive(&self, handle: DenseTensorHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
