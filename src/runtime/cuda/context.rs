//! CUDA primary-context manager

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::device::{CudaDeviceHandle, CudaDeviceLease, CudaDeviceManager};

pub type CudaContextHandle = Handle<CudaContextSpec>;
pub type CudaContextLease = StrongLease<CudaContextSpec>;

/// A retained primary context. Holds its device lease so the device outlives
/// every context minted on it.
#[derive(Debug)]
pub struct CudaContextResource {
    raw: RawObject,
    device: CudaDeviceLease,
}

impl CudaContextResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn device(&self) -> &CudaDeviceLease {
        &self.device
    }

    pub fn device_handle(&self) -> CudaDeviceHandle {
        self.device.handle()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CudaContextRequest {
    pub device: CudaDeviceHandle,
}

#[derive(Clone)]
pub struct CudaContextContext {
    pub ops: Arc<dyn CudaSlowOps>,
    pub devices: CudaDeviceManager,
}

pub struct CudaContextSpec;

impl PoolSpec for CudaContextSpec {
    type Payload = CudaContextResource;
    type Request = CudaContextRequest;
    type Context = CudaContextContext;
    type Category = Shared;

    const NAME: &'static str = "CUDA context manager";

    fn validate(request: &CudaContextRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "context request requires a valid device handle",
            ));
        }
        Ok(())
    }

    fn create(request: &CudaContextRequest, context: &CudaContextContext) -> Result<CudaContextResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.retain_primary_context(device.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure(
                "driver returned a null primary context",
            ));
        }
        Ok(CudaContextResource { raw, device })
    }

    fn destroy(payload: CudaContextResource, context: &CudaContextContext) {
        if let Err(err) = context.ops.release_primary_context(payload.raw) {
            panic!("CUDA primary context release failed: {}", err);
        }
    }
}

/// Context manager with one shared primary context per device.
#[derive(Clone)]
pub struct CudaContextManager {
    pool: PoolManager<CudaContextSpec>,
    by_device: Arc<Mutex<HashMap<CudaDeviceHandle, CudaContextHandle>>>,
}

impl Default for CudaContextManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CudaContextManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            by_device: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn CudaSlowOps>,
        devices: CudaDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, CudaContextContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_device.lock().unwrap().clear();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Retain (or share) the primary context of a device
    pub fn acquire_for_device(&self, device: CudaDeviceHandle) -> Result<CudaContextLease> {
        let mut cache = self.by_device.lock().unwrap();
        if let Some(&handle) = cache.get(&device) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&device);
        }
        let lease = self.pool.acquire(&CudaContextRequest { device })?;
        cache.insert(device, lease.handle());
        Ok(lease)
    }

    pub fn acquire_handle(&self, handle: CudaContextHandle) -> Result<CudaContextLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: CudaContextHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
