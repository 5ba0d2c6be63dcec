//! CUDA device-buffer manager

use std::sync::Arc;

use crate::backend::{CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, StrongLease, Unique};

use super::context::{CudaContextHandle, CudaContextLease, CudaContextManager};

pub type CudaBufferHandle = Handle<CudaBufferSpec>;
pub type CudaBufferLease = StrongLease<CudaBufferSpec>;

/// One device allocation, exclusively owned by its lease
#[derive(Debug)]
pub struct CudaBufferResource {
    raw: RawObject,
    size: usize,
    context: CudaContextLease,
}

impl CudaBufferResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn context(&self) -> &CudaContextLease {
        &self.context
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CudaBufferRequest {
    pub context: CudaContextHandle,
    pub size: usize,
}

#[derive(Clone)]
pub struct CudaBufferContext {
    pub ops: Arc<dyn CudaSlowOps>,
    pub contexts: CudaContextManager,
}

pub struct CudaBufferSpec;

impl PoolSpec for CudaBufferSpec {
    type Payload = CudaBufferResource;
    type Request = CudaBufferRequest;
    type Context = CudaBufferContext;
    type Category = Unique;

    const NAME: &'static str = "CUDA buffer manager";

    fn validate(request: &CudaBufferRequest) -> Result<()> {
        if !request.context.is_valid() {
            return Err(TesseraError::invalid_argument(
                "context",
                "buffer request requires a valid context handle",
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

    fn create(request: &CudaBufferRequest, context: &CudaBufferContext) -> Result<CudaBufferResource> {
        let ctx = context.contexts.acquire_handle(request.context)?;
        let raw = context.ops.allocate_buffer(ctx.raw(), request.size)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("driver returned a null buffer"));
        }
        Ok(CudaBufferResource {
            raw,
            size: request.size,
            context: ctx,
        })
    }

    fn destroy(payload: CudaBufferResource, context: &CudaBufferContext) {
        if let Err(err) = context.ops.free_buffer(payload.raw) {
            panic!("CUDA buffer free failed: {}", err);
        }
    }
}

/// Buffer manager; buffers are exclusively owned.
#[derive(Clone, Default)]
pub struct CudaBufferManager {
    pool: PoolManager<CudaBufferSpec>,
}

impl CudaBufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn CudaSlowOps>,
        contexts: CudaContextManager,
    ) -> Result<()> {
        self.pool.configure(config, CudaBufferContext { ops, contexts })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, context: CudaContextHandle, size: usize) -> Result<CudaBufferLease> {
        self.pool.acquire(&CudaBufferRequest { context, size })
    }

    pub fn is_alive(&self, handle: CudaBufferHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
