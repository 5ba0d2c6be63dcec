//! MPS fence manager
//!
//! Fences are exclusively owned and bound to one command queue at creation;
//! the fence-lifetime tracker re-validates that binding before tracking a
//! hazard.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::{CommandBufferId, MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, StrongLease, Unique};

use super::command_queue::MpsCommandQueueHandle;
use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};

pub type MpsFenceHandle = Handle<MpsFenceSpec>;
pub type MpsFenceLease = StrongLease<MpsFenceSpec>;

/// One fence, bound to its queue, optionally carrying the command buffer it
/// guards. The command-buffer binding is set after submission, so it lives in
/// an atomic (zero = unset).
#[derive(Debug)]
pub struct MpsFenceResource {
    raw: RawObject,
    queue: MpsCommandQueueHandle,
    queue_raw: RawObject,
    command_buffer: AtomicU64,
    device: MpsDeviceLease,
}

impl MpsFenceResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn queue(&self) -> MpsCommandQueueHandle {
        self.queue
    }

    pub fn queue_raw(&self) -> RawObject {
        self.queue_raw
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }

    /// Attach the command buffer this fence guards
    pub fn set_command_buffer(&self, id: CommandBufferId) {
        self.command_buffer.store(id.0, Ordering::Release);
    }

    /// The attached command buffer, if any
    pub fn command_buffer(&self) -> Option<CommandBufferId> {
        match self.command_buffer.load(Ordering::Acquire) {
            0 => None,
            id => Some(CommandBufferId(id)),
        }
    }

    pub fn has_command_buffer(&self) -> bool {
        self.command_buffer().is_some()
    }

    /// Whether the guarded submission has drained. A fence with no command
    /// buffer attached has nothing pending and counts as complete.
    pub fn is_complete(&self, ops: &dyn MpsSlowOps) -> bool {
        match self.command_buffer() {
            None => true,
            Some(id) => ops.command_buffer_complete(self.queue_raw, id),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsFenceRequest {
    pub device: MpsDeviceHandle,
    pub queue: MpsCommandQueueHandle,
    pub queue_raw: RawObject,
}

#[derive(Clone)]
pub struct MpsFenceContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsFenceSpec;

impl PoolSpec for MpsFenceSpec {
    type Payload = MpsFenceResource;
    type Request = MpsFenceRequest;
    type Context = MpsFenceContext;
    type Category = Unique;

    const NAME: &'static str = "MPS fence manager";

    fn validate(request: &MpsFenceRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "fence request requires a valid device handle",
            ));
        }
        if !request.queue.is_valid() {
            return Err(TesseraError::invalid_argument(
                "queue",
                "fence request requires a valid command queue handle",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsFenceRequest, context: &MpsFenceContext) -> Result<MpsFenceResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_fence(device.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null fence"));
        }
        Ok(MpsFenceResource {
            raw,
            queue: request.queue,
            queue_raw: request.queue_raw,
            command_buffer: AtomicU64::new(0),
            device,
        })
    }

    fn destroy(payload: MpsFenceResource, context: &MpsFenceContext) {
        if let Err(err) = context.ops.destroy_fence(payload.raw) {
            panic!("MPS fence destroy failed: {}", err);
        }
    }
}

/// Fence manager; fences are exclusively owned.
#[derive(Clone, Default)]
pub struct MpsFenceManager {
    pool: PoolManager<MpsFenceSpec>,
}

impl MpsFenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        devices: MpsDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsFenceContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, request: &MpsFenceRequest) -> Result<MpsFenceLease> {
        self.pool.acquire(request)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
