//! MPS device manager

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{Architecture, MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

pub type MpsDeviceHandle = Handle<MpsDeviceSpec>;
pub type MpsDeviceLease = StrongLease<MpsDeviceSpec>;

/// One opened Metal device
#[derive(Debug)]
pub struct MpsDeviceResource {
    raw: RawObject,
    ordinal: u32,
    arch: Architecture,
}

impl MpsDeviceResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn arch(&self) -> Architecture {
        self.arch
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MpsDeviceRequest {
    pub ordinal: u32,
}

#[derive(Clone)]
pub struct MpsDeviceContext {
    pub ops: Arc<dyn MpsSlowOps>,
}

pub struct MpsDeviceSpec;

impl PoolSpec for MpsDeviceSpec {
    type Payload = MpsDeviceResource;
    type Request = MpsDeviceRequest;
    type Context = MpsDeviceContext;
    type Category = Shared;

    const NAME: &'static str = "MPS device manager";

    fn create(request: &MpsDeviceRequest, context: &MpsDeviceContext) -> Result<MpsDeviceResource> {
        let count = context.ops.device_count()?;
        if request.ordinal >= count {
            return Err(TesseraError::invalid_argument(
                "ordinal",
                format!("device ordinal {} out of range ({} visible)", request.ordinal, count),
            ));
        }
        let raw = context.ops.create_device(request.ordinal)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null device"));
        }
        let arch = context.ops.device_architecture(raw)?;
        Ok(MpsDeviceResource {
            raw,
            ordinal: request.ordinal,
            arch,
        })
    }

    fn destroy(payload: MpsDeviceResource, context: &MpsDeviceContext) {
        if let Err(err) = context.ops.destroy_device(payload.raw) {
            panic!("MPS device destroy failed: {}", err);
        }
    }
}

/// Device manager with one shared slot per ordinal
#[derive(Clone)]
pub struct MpsDeviceManager {
    pool: PoolManager<MpsDeviceSpec>,
    by_ordinal: Arc<Mutex<HashMap<u32, MpsDeviceHandle>>>,
}

impl Default for MpsDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MpsDeviceManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            by_ordinal: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn configure(&self, config: PoolConfig, ops: Arc<dyn MpsSlowOps>) -> Result<()> {
        self.pool.configure(config, MpsDeviceContext { ops })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_ordinal.lock().unwrap().clear();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire_ordinal(&self, ordinal: u32) -> Result<MpsDeviceLease> {
        let mut cache = self.by_ordinal.lock().unwrap();
        if let Some(&handle) = cache.get(&ordinal) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&ordinal);
        }
        let lease = self.pool.acquire(&MpsDeviceRequest { ordinal })?;
        cache.insert(ordinal, lease.handle());
        Ok(lease)
    }

    pub fn acquire_handle(&self, handle: MpsDeviceHandle) -> Result<MpsDeviceLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: MpsDeviceHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
