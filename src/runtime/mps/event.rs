//! MPS event manager

use std::sync::Arc;

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, StrongLease, Unique};

use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};

pub type MpsEventHandle = Handle<MpsEventSpec>;
pub type MpsEventLease = StrongLease<MpsEventSpec>;

#[derive(Debug)]
pub struct MpsEventResource {
    raw: RawObject,
    device: MpsDeviceLease,
}

impl MpsEventResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsEventRequest {
    pub device: MpsDeviceHandle,
}

#[derive(Clone)]
pub struct MpsEventContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsEventSpec;

impl PoolSpec for MpsEventSpec {
    type Payload = MpsEventResource;
    type Request = MpsEventRequest;
    type Context = MpsEventContext;
    type Category = Unique;

    const NAME: &'static str = "MPS event manager";

    fn validate(request: &MpsEventRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "event request requires a valid device handle",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsEventRequest, context: &MpsEventContext) -> Result<MpsEventResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_event(device.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null event"));
        }
        Ok(MpsEventResource { raw, device })
    }

    fn destroy(payload: MpsEventResource, context: &MpsEventContext) {
        if let Err(err) = context.ops.destroy_event(payload.raw) {
            panic!("MPS event destroy failed: {}", err);
        }
    }
}

#[derive(Clone, Default)]
pub struct MpsEventManager {
    pool: PoolManager<MpsEventSpec>,
}

impl MpsEventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        devices: MpsDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsEventContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, device: MpsDeviceHandle) -> Result<MpsEventLease> {
        self.pool.acquire(&MpsEventRequest { device })
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
