//! CPU runtime
//!
//! The host "device" is a trivial payload with uncounted (raw) leases: there
//! is exactly one of it per process and no backend object to tear down.

use crate::backend::Architecture;
use crate::error::Result;
use crate::handle::Handle;
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Raw, StrongLease};

pub type CpuDeviceHandle = Handle<CpuDeviceSpec>;
pub type CpuDeviceLease = StrongLease<CpuDeviceSpec>;

#[derive(Debug)]
pub struct CpuDeviceResource {
    arch: Architecture,
}

impl CpuDeviceResource {
    pub fn arch(&self) -> Architecture {
        self.arch
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuDeviceRequest;

pub struct CpuDeviceSpec;

impl PoolSpec for CpuDeviceSpec {
    type Payload = CpuDeviceResource;
    type Request = CpuDeviceRequest;
    type Context = ();
    type Category = Raw;

    const NAME: &'static str = "CPU device manager";

    fn create(_request: &CpuDeviceRequest, _context: &()) -> Result<CpuDeviceResource> {
        Ok(CpuDeviceResource {
            arch: Architecture::Generic,
        })
    }

    fn destroy(_payload: CpuDeviceResource, _context: &()) {}
}

/// Pool sizing for the CPU runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuRuntimeConfig {
    pub devices: PoolConfig,
}

/// Registry of the CPU managers
#[derive(Clone, Default)]
pub struct CpuRuntime {
    pub devices: PoolManager<CpuDeviceSpec>,
}

impl CpuRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(&self, config: CpuRuntimeConfig) -> Result<()> {
        self.devices.configure(config.devices, ())
    }

    pub fn shutdown(&self) -> Result<()> {
        self.devices.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.devices.is_configured()
    }

    /// Lease the host device
    pub fn acquire_device(&self) -> Result<CpuDeviceLease> {
        self.devices.acquire(&CpuDeviceRequest)
    }
}
