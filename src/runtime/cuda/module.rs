//! CUDA module manager with key-based sharing

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::context::{CudaContextHandle, CudaContextLease, CudaContextManager};

pub type CudaModuleHandle = Handle<CudaModuleSpec>;
pub type CudaModuleLease = StrongLease<CudaModuleSpec>;

/// Cache key for loaded modules: one live module per (context, image) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CudaModuleKey {
    pub context: CudaContextHandle,
    pub image: String,
}

/// A loaded module, pinned to its context
#[derive(Debug)]
pub struct CudaModuleResource {
    raw: RawObject,
    image: String,
    context: CudaContextLease,
}

impl CudaModuleResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn context(&self) -> &CudaContextLease {
        &self.context
    }
}

#[derive(Debug, Clone)]
pub struct CudaModuleRequest {
    pub context: CudaContextHandle,
    pub image: String,
}

#[derive(Clone)]
pub struct CudaModuleContext {
    pub ops: Arc<dyn CudaSlowOps>,
    pub contexts: CudaContextManager,
}

pub struct CudaModuleSpec;

impl PoolSpec for CudaModuleSpec {
    type Payload = CudaModuleResource;
    type Request = CudaModuleRequest;
    type Context = CudaModuleContext;
    type Category = Shared;

    const NAME: &'static str = "CUDA module manager";

    fn validate(request: &CudaModuleRequest) -> Result<()> {
        if !request.context.is_valid() {
            return Err(TesseraError::invalid_argument(
                "context",
                "module request requires a valid context handle",
            ));
        }
        if request.image.is_empty() {
            return Err(TesseraError::invalid_argument(
                "image",
                "module request requires a non-empty image",
            ));
        }
        Ok(())
    }

    fn create(request: &CudaModuleRequest, context: &CudaModuleContext) -> Result<CudaModuleResource> {
        let ctx = context.contexts.acquire_handle(request.context)?;
        let raw = context.ops.create_module(ctx.raw(), &request.image)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("driver returned a null module"));
        }
        Ok(CudaModuleResource {
            raw,
            image: request.image.clone(),
            context: ctx,
        })
    }

    fn destroy(payload: CudaModuleResource, context: &CudaModuleContext) {
        if let Err(err) = context.ops.destroy_module(payload.raw) {
            panic!("CUDA module unload failed: {}", err);
        }
    }
}

/// Module manager; repeated loads of the same image in the same context share
/// one live module.
#[derive(Clone)]
pub struct CudaModuleManager {
    pool: PoolManager<CudaModuleSpec>,
    ops: Arc<Mutex<Option<Arc<dyn CudaSlowOps>>>>,
    by_key: Arc<Mutex<HashMap<CudaModuleKey, CudaModuleHandle>>>,
}

impl Default for CudaModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CudaModuleManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            ops: Arc::new(Mutex::new(None)),
            by_key: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn CudaSlowOps>,
        contexts: CudaContextManager,
    ) -> Result<()> {
        *self.ops.lock().unwrap() = Some(Arc::clone(&ops));
        self.pool.configure(config, CudaModuleContext { ops, contexts })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_key.lock().unwrap().clear();
        self.ops.lock().unwrap().take();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Load (or share) the module for `image` in the given context
    pub fn acquire(&self, context: CudaContextHandle, image: &str) -> Result<CudaModuleLease> {
        let key = CudaModuleKey {
            context,
            image: image.to_string(),
        };
        let mut cache = self.by_key.lock().unwrap();
        if let Some(&handle) = cache.get(&key) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&key);
        }
        let lease = self.pool.acquire(&CudaModuleRequest {
            context,
            image: image.to_string(),
        })?;
        cache.insert(key, lease.handle());
        Ok(lease)
    }

    pub fn acquire_handle(&self, handle: CudaModuleHandle) -> Result<CudaModuleLease> {
        self.pool.acquire_handle(handle)
    }

    /// Look up a kernel function inside a leased module
    pub fn get_function(&self, module: &CudaModuleLease, name: &str) -> Result<RawObject> {
        if name.is_empty() {
            return Err(TesseraError::invalid_argument(
                "name",
                "function name must be non-empty",
            ));
        }
        let ops = self
            .ops
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TesseraError::not_configured(CudaModuleSpec::NAME))?;
        let function = ops.get_function(module.raw(), name)?;
        if function.is_null() {
            return Err(TesseraError::backend_failure(format!(
                "function {} not found in module {}",
                name,
                module.image()
            )));
        }
        Ok(function)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
