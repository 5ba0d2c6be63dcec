//! CUDA storage manager

use std::sync::Arc;

use crate::error::Result;
use crate::handle::Handle;
use crate::heap::HierarchicalSlotAllocator;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};
use crate::runtime::cuda::CudaHeapOps;

use super::{create_storage, destroy_storage, validate_request, StorageRequest, StorageResource};

pub type CudaStorageHandle = Handle<CudaStorageSpec>;
pub type CudaStorageLease = StrongLease<CudaStorageSpec>;

#[derive(Clone)]
pub struct CudaStorageContext {
    pub allocator: Arc<HierarchicalSlotAllocator<CudaHeapOps>>,
}

pub struct CudaStorageSpec;

impl PoolSpec for CudaStorageSpec {
    type Payload = StorageResource;
    type Request = StorageRequest;
    type Context = CudaStorageContext;
    type Category = Shared;

    const NAME: &'static str = "CUDA storage manager";

    fn validate(request: &StorageRequest) -> Result<()> {
        validate_request(request)
    }

    fn create(request: &StorageRequest, context: &CudaStorageContext) -> Result<StorageResource> {
        create_storage(&context.allocator, request)
    }

    fn destroy(payload: StorageResource, context: &CudaStorageContext) {
        destroy_storage(&context.allocator, payload);
    }
}

/// Storage manager over a device-memory hierarchical allocator
#[derive(Clone, Default)]
pub struct CudaStorageManager {
    pool: PoolManager<CudaStorageSpec>,
}

impl CudaStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        allocator: Arc<HierarchicalSlotAllocator<CudaHeapOps>>,
    ) -> Result<()> {
        self.pool.configure(config, CudaStorageContext { allocator })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, request: &StorageRequest) -> Result<CudaStorageLease> {
        self.pool.acquire(request)
    }

    pub fn acquire_handle(&self, handle: CudaStorageHandle) -> Result<CudaStorageLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: CudaStorageHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
