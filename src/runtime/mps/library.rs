//! MPS shader-library manager with key-based sharing

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};

pub type MpsLibraryHandle = Handle<MpsLibrarySpec>;
pub type MpsLibraryLease = StrongLease<MpsLibrarySpec>;

/// One live library per (device, source) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MpsLibraryKey {
    pub device: MpsDeviceHandle,
    pub source: String,
}

#[derive(Debug)]
pub struct MpsLibraryResource {
    raw: RawObject,
    source: String,
    device: MpsDeviceLease,
}

impl MpsLibraryResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }
}

#[derive(Debug, Clone)]
pub struct MpsLibraryRequest {
    pub device: MpsDeviceHandle,
    pub source: String,
}

#[derive(Clone)]
pub struct MpsLibraryContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsLibrarySpec;

impl PoolSpec for MpsLibrarySpec {
    type Payload = MpsLibraryResource;
    type Request = MpsLibraryRequest;
    type Context = MpsLibraryContext;
    type Category = Shared;

    const NAME: &'static str = "MPS library manager";

    fn validate(request: &MpsLibraryRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "library request requires a valid device handle",
            ));
        }
        if request.source.is_empty() {
            return Err(TesseraError::invalid_argument(
                "source",
                "library request requires non-empty source",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsLibraryRequest, context: &MpsLibraryContext) -> Result<MpsLibraryResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_library(device.raw(), &request.source)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null library"));
        }
        Ok(MpsLibraryResource {
            raw,
            source: request.source.clone(),
            device,
        })
    }

    fn destroy(payload: MpsLibraryResource, context: &MpsLibraryContext) {
        if let Err(err) = context.ops.destroy_library(payload.raw) {
            panic!("MPS library destroy failed: {}", err);
        }
    }
}

#[derive(Clone)]
pub struct MpsLibraryManager {
    pool: PoolManager<MpsLibrarySpec>,
    by_key: Arc<Mutex<HashMap<MpsLibraryKey, MpsLibraryHandle>>>,
}

impl Default for MpsLibraryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MpsLibraryManager {
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
        devices: MpsDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsLibraryContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_key.lock().unwrap().clear();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Compile (or share) the library for `source` on the given device
    pub fn acquire(&self, device: MpsDeviceHandle, source: &str) -> Result<MpsLibraryLease> {
        let key = MpsLibraryKey {
            device,
            source: source.to_string(),
        };
        let mut cache = self.by_key.lock().unwrap();
        if let Some(&handle) = cache.get(&key) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&key);
        }
        let lease = self.pool.acquire(&MpsLibraryRequest {
            device,
            source: source.to_string(),
        })?;
        cache.insert(key, lease.handle());
        Ok(lease)
    }

    pub fn acquire_handle(&self, handle: MpsLibraryHandle) -> Result<MpsLibraryLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
