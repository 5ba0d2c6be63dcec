//! CUDA device manager

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{Architecture, CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

/// Handle for CUDA device slots
pub type CudaDeviceHandle = Handle<CudaDeviceSpec>;

/// Strong lease on a CUDA device
pub type CudaDeviceLease = StrongLease<CudaDeviceSpec>;

/// One opened CUDA device
#[derive(Debug)]
pub struct CudaDeviceResource {
    raw: RawObject,
    ordinal: u32,
    arch: Architecture,
}

impl CudaDeviceResource {
    /// Opaque driver object
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    /// Driver ordinal of the device
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Architecture family reported by the probe
    pub fn arch(&self) -> Architecture {
        self.arch
    }
}

/// Request for opening a CUDA device
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaDeviceRequest {
    pub ordinal: u32,
}

/// Environment for the device callbacks
#[derive(Clone)]
pub struct CudaDeviceContext {
    pub ops: Arc<dyn CudaSlowOps>,
}

pub struct CudaDeviceSpec;

impl PoolSpec for CudaDeviceSpec {
    type Payload = CudaDeviceResource;
    type Request = CudaDeviceRequest;
    type Context = CudaDeviceContext;
    type Category = Shared;

    const NAME: &'static str = "CUDA device manager";

    fn create(request: &CudaDeviceRequest, context: &CudaDeviceContext) -> Result<CudaDeviceResource> {
        let count = context.ops.device_count()?;
        if request.ordinal >= count {
            return Err(TesseraError::invalid_argument(
                "ordinal",
                format!("device ordinal {} out of range ({} visible)", request.ordinal, count),
            ));
        }
        let raw = context.ops.create_device(request.ordinal)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("driver returned a null device"));
        }
        let arch = context.ops.device_architecture(raw)?;
        Ok(CudaDeviceResource {
            raw,
            ordinal: request.ordinal,
            arch,
        })
    }

    fn destroy(payload: CudaDeviceResource, context: &CudaDeviceContext) {
        if let Err(err) = context.ops.destroy_device(payload.raw) {
            panic!("CUDA device destroy failed: {}", err);
        }
    }
}

/// Device manager with one shared slot per driver ordinal.
///
/// Repeated acquires of the same ordinal share the live payload; the cache is
/// refreshed transparently when a cached slot has expired.
#[derive(Clone)]
pub struct CudaDeviceManager {
    pool: PoolManager<CudaDeviceSpec>,
    by_ordinal: Arc<Mutex<HashMap<u32, CudaDeviceHandle>>>,
}

impl Default for CudaDeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CudaDeviceManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            by_ordinal: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn configure(&self, config: PoolConfig, ops: Arc<dyn CudaSlowOps>) -> Result<()> {
        self.pool.configure(config, CudaDeviceContext { ops })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.by_ordinal.lock().unwrap().clear();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Open (or share) the device with the given ordinal
    pub fn acquire_ordinal(&self, ordinal: u32) -> Result<CudaDeviceLease> {
        let mut cache = self.by_ordinal.lock().unwrap();
        if let Some(&handle) = cache.get(&ordinal) {
            if let Ok(lease) = self.pool.acquire_handle(handle) {
                return Ok(lease);
            }
            cache.remove(&ordinal);
        }
        let lease = self.pool.acquire(&CudaDeviceRequest { ordinal })?;
        cache.insert(ordinal, lease.handle());
        Ok(lease)
    }

    /// Lease a device by handle
    pub fn acquire_handle(&self, handle: CudaDeviceHandle) -> Result<CudaDeviceLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: CudaDeviceHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
