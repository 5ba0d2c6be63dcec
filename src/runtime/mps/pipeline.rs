//! MPS compute-pipeline-state manager with key-based sharing

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::library::{MpsLibraryHandle, MpsLibraryLease, MpsLibraryManager};

pub type MpsPipelineHandle = Handle<MpsPipelineSpec>;
pub type MpsPipelineLease = StrongLease<MpsPipelineSpec>;

/// One live pipeline per (library, function) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MpsPipelineKey {
    pub library: MpsLibraryHandle,
    pub function: String,
}

#[derive(Debug)]
pub struct MpsPipelineResource {
    raw: RawObject,
    function: String,
    library: MpsLibraryLease,
}

impl MpsPipelineResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn library(&self) -> &MpsLibraryLease {
        &self.library
    }
}

#[derive(Debug, Clone)]
pub struct MpsPipelineRequest {
    pub library: MpsLibraryHandle,
    pub function: String,
}

#[derive(Clone)]
pub struct MpsPipelineContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub libraries: MpsLibraryManager,
}

pub struct MpsPipelineSpec;

impl PoolSpec for MpsPipelineSpec {
    type Payload = MpsPipelineResource;
    type Request = MpsPipelineRequest;
    type Context = MpsPipelineContext;
    type Category = Shared;

    const NAME: &'static str = "MPS pipeline manager";

    fn validate(request: &MpsPipelineRequest) -> Result<()> {
        if !request.library.is_valid() {
            return Err(TesseraError::invalid_argument(
                "library",
                "pipeline request requires a valid library handle",
            ));
        }
        if request.function.is_empty() {
            return Err(TesseraError::invalid_argument(
                "function",
                "pipeline request requires a function name",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsPipelineRequest, context: &MpsPipelineContext) -> Result<MpsPipelineResource> {
        let library = context.libraries.acquire_handle(request.library)?;
        let raw = context
            .ops
            .create_pipeline_state(library.raw(), &request.function)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure(format!(
                "pipeline state for function {} could not be built",
                request.function
            )));
        }
        Ok(MpsPipelineResource {
            raw,
            function: request.function.clone(),
            library,
        })
    }

    fn destroy(payload: MpsPipelineResource, context: &MpsPipelineContext) {
        if let Err(err) = context.ops.destroy_pipeline_state(payload.raw) {
            panic!("MPS pipeline destroy failed: {}", err);
        }
    }
}

#[derive(Clone)]
pub struct MpsPipelineManager {
    pool: PoolManager<MpsPipelineSpec>,
    by_key: Arc<Mutex<HashMap<MpsPipelineKey, MpsPipelineHandle>>>,
}

impl Default for MpsPipelineManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MpsPipelineManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            by_key: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        libraries: MpsLibraryManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsPipelineContext { ops, libraries })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_key.lock().unwrap().clear();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Build (or share) the pipeline for a function in a library
    pub fn acquire(&self, library: MpsLibraryHandle, function: &str) -> Result<MpsPipelineLease> {
        let key = MpsPipelineKey {
            library,
            function: function.to_string(),
        };
        let mut cache = self.by_key.lock().unwrap();
        if let Some(&handle) = cache.get(&key) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&key);
        }
        let lease = self.pool.acquire(&MpsPipelineRequest {
            library,
            function: function.to_string(),
        })?;
        cache.insert(key, lease.handle());
        Ok(lease)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
