//! MPS execution context and scoped guard

use std::sync::Mutex;

use crate::error::Result;
use crate::runtime::mps::{MpsCommandQueueLease, MpsDeviceLease, MpsRuntime};

/// Bundle of leases pinning one (device, command queue) pair
#[derive(Debug, Clone)]
pub struct MpsExecutionContext {
    pub device: MpsDeviceLease,
    pub command_queue: MpsCommandQueueLease,
}

static CURRENT_MPS: Mutex<Option<MpsExecutionContext>> = Mutex::new(None);

/// The ambient execution context, if one is installed
pub fn current() -> Option<MpsExecutionContext> {
    CURRENT_MPS.lock().unwrap().clone()
}

/// Fresh strong lease on the ambient device
pub fn current_device() -> Option<MpsDeviceLease> {
    CURRENT_MPS
        .lock()
        .unwrap()
        .as_ref()
        .map(|ctx| ctx.device.clone())
}

/// Fresh strong lease on the ambient command queue
pub fn current_command_queue() -> Option<MpsCommandQueueLease> {
    CURRENT_MPS
        .lock()
        .unwrap()
        .as_ref()
        .map(|ctx| ctx.command_queue.clone())
}

fn replace(next: Option<MpsExecutionContext>) -> Option<MpsExecutionContext> {
    std::mem::replace(&mut *CURRENT_MPS.lock().unwrap(), next)
}

/// RAII guard that installs an MPS execution context for its lifetime
#[derive(Debug)]
pub struct MpsContextGuard {
    previous: Option<MpsExecutionContext>,
    active: bool,
}

impl MpsContextGuard {
    /// Device 0 with a fresh command queue
    pub fn new(runtime: &MpsRuntime) -> Result<Self> {
        Self::with_device(runtime, 0)
    }

    /// Chosen device with a fresh command queue
    pub fn with_device(runtime: &MpsRuntime, ordinal: u32) -> Result<Self> {
        let device = runtime.devices.acquire_ordinal(ordinal)?;
        let command_queue = runtime.command_queues.acquire(device.handle())?;
        Ok(Self::install(MpsExecutionContext {
            device,
            command_queue,
        }))
    }

    fn install(bundle: MpsExecutionContext) -> Self {
        let previous = replace(Some(bundle));
        Self {
            previous,
            active: true,
        }
    }
}

impl Drop for MpsContextGuard {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            replace(self.previous.take());
        }
    }
}
