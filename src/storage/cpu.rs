//! Host storage manager

use std::sync::Arc;

use crate::backend::HostHeapOps;
use crate::error::Result;
use crate::handle::Handle;
use crate::heap::HierarchicalSlotAllocator;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::{create_storage, destroy_storage, validate_request, StorageRequest, StorageResource};

pub type CpuStorageHandle = Handle<CpuStorageSpec>;
pub type CpuStorageLease = StrongLease<CpuStorageSpec>;

#[derive(Clone)]
pub struct CpuStorageContext {
    pub allocator: Arc<HierarchicalSlotAllocator<HostHeapOps>>,
}

pub struct CpuStorageSpec;

impl PoolSpec for CpuStorageSpec {
    type Payload = StorageResource;
    type Request = StorageRequest;
    type Context = CpuStorageContext;
    type Category = Shared;

    const NAME: &'static str = "CPU storage manager";

    fn validate(request: &StorageRequest) -> Result<()> {
        validate_request(request)
    }

    fn create(request: &StorageRequest, context: &CpuStorageContext) -> Result<StorageResource> {
        create_storage(&context.allocator, request)
    }

    fn destroy(payload: StorageResource, context: &CpuStorageContext) {
        destroy_storage(&context.allocator, payload);
    }
}

/// Storage manager over a host-memory hierarchical allocator
#[derive(Clone, Default)]
pub struct CpuStorageManager {
    pool: PoolManager<CpuStorageSpec>,
}

impl CpuStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        allocator: Arc<HierarchicalSlotAllocator<HostHeapOps>>,
    ) -> Result<()> {
        self.pool.configure(config, CpuStorageContext { allocator })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, request: &StorageRequest) -> Result<CpuStorageLease> {
        self.pool.acquire(request)
    }

    pub fn acquire_handle(&self, handle: CpuStorageHandle) -> Result<CpuStorageLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: CpuStorageHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
