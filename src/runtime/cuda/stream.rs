//! CUDA stream manager

use std::sync::Arc;

use crate::backend::{CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::context::{CudaContextHandle, CudaContextLease, CudaContextManager};

pub type CudaStreamHandle = Handle<CudaStreamSpec>;
pub type CudaStreamLease = StrongLease<CudaStreamSpec>;

/// One stream, pinned to the context it was created in
#[derive(Debug)]
pub struct CudaStreamResource {
    raw: RawObject,
    context: CudaContextLease,
}

impl CudaStreamResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn context(&self) -> &CudaContextLease {
        &self.context
    }

    pub fn context_handle(&self) -> CudaContextHandle {
        self.context.handle()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CudaStreamRequest {
    pub context: CudaContextHandle,
}

#[derive(Clone)]
pub struct CudaStreamContext {
    pub ops: Arc<dyn CudaSlowOps>,
    pub contexts: CudaContextManager,
}

pub struct CudaStreamSpec;

impl PoolSpec for CudaStreamSpec {
    type Payload = CudaStreamResource;
    type Request = CudaStreamRequest;
    type Context = CudaStreamContext;
    type Category = Shared;

    const NAME: &'static str = "CUDA stream manager";

    fn validate(request: &CudaStreamRequest) -> Result<()> {
        if !request.context.is_valid() {
            return Err(TesseraError::invalid_argument(
                "context",
                "stream request requires a valid context handle",
            ));
        }
        Ok(())
    }

    fn create(request: &CudaStreamRequest, context: &CudaStreamContext) -> Result<CudaStreamResource> {
        let ctx = context.contexts.acquire_handle(request.context)?;
        let raw = context.ops.create_stream(ctx.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("driver returned a null stream"));
        }
        Ok(CudaStreamResource { raw, context: ctx })
    }

    fn destroy(payload: CudaStreamResource, context: &CudaStreamContext) {
        if let Err(err) = context.ops.destroy_stream(payload.raw) {
            panic!("CUDA stream destroy failed: {}", err);
        }
    }
}

/// Stream manager; every acquire creates a fresh stream.
#[derive(Clone, Default)]
pub struct CudaStreamManager {
    pool: PoolManager<CudaStreamSpec>,
}

impl CudaStreamManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn CudaSlowOps>,
        contexts: CudaContextManager,
    ) -> Result<()> {
        self.pool.configure(config, CudaStreamContext { ops, contexts })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, context: CudaContextHandle) -> Result<CudaStreamLease> {
        self.pool.acquire(&CudaStreamRequest { context })
    }

    pub fn acquire_handle(&self, handle: CudaStreamHandle) -> Result<CudaStreamLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: CudaStreamHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
