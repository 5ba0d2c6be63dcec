//! MPS storage manager

use std::sync::Arc;

use crate::error::Result;
use crate::handle::Handle;
use crate::heap::HierarchicalSlotAllocator;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};
use crate::runtime::mps::MpsAllocatorHeapOps;

use super::{create_storage, destroy_storage, validate_request, StorageRequest, StorageResource};

pub type MpsStorageHandle = Handle<MpsStorageSpec>;
pub type MpsStorageLease = StrongLease<MpsStorageSpec>;

#[derive(Clone)]
pub struct MpsStorageContext {
    pub allocator: Arc<HierarchicalSlotAllocator<MpsAllocatorHeapOps>>,
}

pub struct MpsStorageSpec;

impl PoolSpec for MpsStorageSpec {
    type Payload = StorageResource;
    type Request = StorageRequest;
    type Context = MpsStorageContext;
    type Category = Shared;

    const NAME: &'static str = "MPS storage manager";

    fn validate(request: &StorageRequest) -> Result<()> {
        validate_request(request)
    }

    fn create(request: &StorageRequest, context: &MpsStorageContext) -> Result<StorageResource> {
        create_storage(&context.allocator, request)
    }

    fn destroy(payload: StorageResource, context: &MpsStorageContext) {
        destroy_storage(&context.allocator, payload);
    }
}

/// Storage manager over a heap-backed hierarchical allocator
#[derive(Clone, Default)]
pub struct MpsStorageManager {
    pool: PoolManager<MpsStorageSpec>,
}

impl MpsStorageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        allocator: Arc<HierarchicalSlotAllocator<MpsAllocatorHeapOps>>,
    ) -> Result<()> {
        self.pool.configure(config, MpsStorageContext { allocator })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, request: &StorageRequest) -> Result<MpsStorageLease> {
        self.pool.acquire(request)
    }

    pub fn acquire_handle(&self, handle: MpsStorageHandle) -> Result<MpsStorageLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: MpsStorageHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
