//! MPS command-queue manager

use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{CommandBufferId, MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};
use super::fence::MpsFenceManager;
use super::fence_lifetime::FenceLifetimeManager;

pub type MpsCommandQueueHandle = Handle<MpsCommandQueueSpec>;
pub type MpsCommandQueueLease = StrongLease<MpsCommandQueueSpec>;

/// One command queue. Owns the fence-lifetime tracker that defers hazard
/// release until the queue has drained past them.
#[derive(Debug)]
pub struct MpsCommandQueueResource {
    raw: RawObject,
    device: MpsDeviceLease,
    lifetime: Mutex<FenceLifetimeManager>,
}

impl MpsCommandQueueResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }

    pub fn device_handle(&self) -> MpsDeviceHandle {
        self.device.handle()
    }

    /// Locked access to the queue's fence-lifetime tracker
    pub fn lifetime(&self) -> MutexGuard<'_, FenceLifetimeManager> {
        self.lifetime.lock().unwrap()
    }

    /// Record a submission on this queue
    pub fn record_submit(&self, ops: &dyn MpsSlowOps) -> Result<CommandBufferId> {
        ops.record_submit(self.raw)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsCommandQueueRequest {
    pub device: MpsDeviceHandle,
}

#[derive(Clone)]
pub struct MpsCommandQueueContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsCommandQueueSpec;

impl PoolSpec for MpsCommandQueueSpec {
    type Payload = MpsCommandQueueResource;
    type Request = MpsCommandQueueRequest;
    type Context = MpsCommandQueueContext;
    type Category = Shared;

    const NAME: &'static str = "MPS command queue manager";

    fn validate(request: &MpsCommandQueueRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "command queue request requires a valid device handle",
            ));
        }
        Ok(())
    }

    fn create(
        request: &MpsCommandQueueRequest,
        context: &MpsCommandQueueContext,
    ) -> Result<MpsCommandQueueResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_command_queue(device.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure(
                "Metal returned a null command queue",
            ));
        }
        Ok(MpsCommandQueueResource {
            raw,
            device,
            lifetime: Mutex::new(FenceLifetimeManager::new()),
        })
    }

    fn destroy(payload: MpsCommandQueueResource, context: &MpsCommandQueueContext) {
        // Drop anything still tracked before the queue object goes away.
        payload.lifetime().clear();
        if let Err(err) = context.ops.destroy_command_queue(payload.raw) {
            panic!("MPS command queue destroy failed: {}", err);
        }
    }
}

/// Command-queue manager.
///
/// Acquisition wires the queue's fence-lifetime tracker to the fence pool;
/// every queue created here is ready to track hazards.
#[derive(Clone)]
pub struct MpsCommandQueueManager {
    pool: PoolManager<MpsCommandQueueSpec>,
    fences: Arc<Mutex<Option<MpsFenceManager>>>,
}

impl Default for MpsCommandQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MpsCommandQueueManager {
    pub fn new() -> Self {
        Self {
            pool: PoolManager::new(),
            fences: Arc::new(Mutex::new(None)),
        }
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        devices: MpsDeviceManager,
        fences: MpsFenceManager,
    ) -> Result<()> {
        self.pool
            .configure(config, MpsCommandQueueContext { ops, devices })?;
        *self.fences.lock().unwrap() = Some(fences);
        Ok(())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()?;
        self.fences.lock().unwrap().take();
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    /// Create a command queue on a device, with its tracker wired
    pub fn acquire(&self, device: MpsDeviceHandle) -> Result<MpsCommandQueueLease> {
        let fences = self
            .fences
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TesseraError::not_configured(MpsCommandQueueSpec::NAME))?;
        let lease = self.pool.acquire(&MpsCommandQueueRequest { device })?;
        let mut lifetime = lease.lifetime();
        if !lifetime.is_configured() {
            lifetime.configure(fences, device, lease.handle(), lease.raw())?;
        }
        drop(lifetime);
        Ok(lease)
    }

    pub fn acquire_handle(&self, handle: MpsCommandQueueHandle) -> Result<MpsCommandQueueLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn is_alive(&self, handle: MpsCommandQueueHandle) -> bool {
        self.pool.is_alive(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
