//! MPS buffer manager

use std::sync::Arc;

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, StrongLease, Unique};

use super::heap::{MpsHeapHandle, MpsHeapLease, MpsHeapManager};

pub type MpsBufferHandle = Handle<MpsBufferSpec>;
pub type MpsBufferLease = StrongLease<MpsBufferSpec>;

/// One buffer suballocated from a device heap
#[derive(Debug)]
pub struct MpsBufferResource {
    raw: RawObject,
    size: usize,
    heap: MpsHeapLease,
}

impl MpsBufferResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn heap(&self) -> &MpsHeapLease {
        &self.heap
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsBufferRequest {
    pub heap: MpsHeapHandle,
    pub size: usize,
}

#[derive(Clone)]
pub struct MpsBufferContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub heaps: MpsHeapManager,
}

pub struct MpsBufferSpec;

impl PoolSpec for MpsBufferSpec {
    type Payload = MpsBufferResource;
    type Request = MpsBufferRequest;
    type Context = MpsBufferContext;
    type Category = Unique;

    const NAME: &'static str = "MPS buffer manager";

    fn validate(request: &MpsBufferRequest) -> Result<()> {
        if !request.heap.is_valid() {
            return Err(TesseraError::invalid_argument(
                "heap",
                "buffer request requires a valid heap handle",
            ));
        }
        if request.size == 0 {
            return Err(TesseraError::invalid_argument(
                "size",
                "buffer size must be non-zero",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsBufferRequest, context: &MpsBufferContext) -> Result<MpsBufferResource> {
        let heap = context.heaps.acquire_handle(request.heap)?;
        let raw = context.ops.allocate_buffer(heap.raw(), request.size)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null buffer"));
        }
        Ok(MpsBufferResource {
            raw,
            size: request.size,
            heap,
        })
    }

    fn destroy(payload: MpsBufferResource, context: &MpsBufferContext) {
        if let Err(err) = context.ops.free_buffer(payload.raw) {
            panic!("MPS buffer free failed: {}", err);
        }
    }
}

#[derive(Clone, Default)]
pub struct MpsBufferManager {
    pool: PoolManager<MpsBufferSpec>,
}

impl MpsBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        heaps: MpsHeapManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsBufferContext { ops, heaps })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, heap: MpsHeapHandle, size: usize) -> Result<MpsBufferLease> {
        self.pool.acquire(&MpsBufferRequest { heap, size })
    }

    pub fn is_alive(&self, handle: MpsBufferHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
