//! MPS graph manager

use std::sync::Arc;

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};

pub type MpsGraphHandle = Handle<MpsGraphSpec>;
pub type MpsGraphLease = StrongLease<MpsGraphSpec>;

#[derive(Debug)]
pub struct MpsGraphResource {
    raw: RawObject,
    device: MpsDeviceLease,
}

impl MpsGraphResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsGraphRequest {
    pub device: MpsDeviceHandle,
}

#[derive(Clone)]
pub struct MpsGraphContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsGraphSpec;

impl PoolSpec for MpsGraphSpec {
    type Payload = MpsGraphResource;
    type Request = MpsGraphRequest;
    type Context = MpsGraphContext;
    type Category = Shared;

    const NAME: &'static str = "MPS graph manager";

    fn validate(request: &MpsGraphRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "graph request requires a valid device handle",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsGraphRequest, context: &MpsGraphContext) -> Result<MpsGraphResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_graph(device.raw())?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null graph"));
        }
        Ok(MpsGraphResource { raw, device })
    }

    fn destroy(payload: MpsGraphResource, context: &MpsGraphContext) {
        if let Err(err) = context.ops.destroy_graph(payload.raw) {
            panic!("MPS graph destroy failed: {}", err);
        }
    }
}

#[derive(Clone, Default)]
pub struct MpsGraphManager {
    pool: PoolManager<MpsGraphSpec>,
}

impl MpsGraphManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        devices: MpsDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsGraphContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, device: MpsDeviceHandle) -> Result<MpsGraphLease> {
        self.pool.acquire(&MpsGraphRequest { device })
    }

    pub fn acquire_handle(&self, handle: MpsGraphHandle) -> Result<MpsGraphLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}
