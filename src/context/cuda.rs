//! CUDA execution context and scoped guard

use std::sync::Mutex;

use crate::error::Result;
use crate::runtime::cuda::{
    CudaContextLease, CudaDeviceLease, CudaRuntime, CudaStreamHandle, CudaStreamLease,
};

/// Bundle of leases pinning one (device, primary context, stream) triple
#[derive(Debug, Clone)]
pub struct CudaExecutionContext {
    pub device: CudaDeviceLease,
    pub context: CudaContextLease,
    pub stream: CudaStreamLease,
}

/// Process-global ambient context (not thread-local)
static CURRENT_CUDA: Mutex<Option<CudaExecutionContext>> = Mutex::new(None);

/// The ambient execution context, if one is installed
pub fn current() -> Option<CudaExecutionContext> {
    CURRENT_CUDA.lock().unwrap().clone()
}

/// Fresh strong lease on the ambient device
pub fn current_device() -> Option<CudaDeviceLease> {
    CURRENT_CUDA
        .lock()
        .unwrap()
        .as_ref()
        .map(|ctx| ctx.device.clone())
}

/// Fresh strong lease on the ambient primary context
pub fn current_context() -> Option<CudaContextLease> {
    CURRENT_CUDA
        .lock()
        .unwrap()
        .as_ref()
        .map(|ctx| ctx.context.clone())
}

/// Fresh strong lease on the ambient stream
pub fn current_stream() -> Option<CudaStreamLease> {
    CURRENT_CUDA
        .lock()
        .unwrap()
        .as_ref()
        .map(|ctx| ctx.stream.clone())
}

fn replace(next: Option<CudaExecutionContext>) -> Option<CudaExecutionContext> {
    std::mem::replace(&mut *CURRENT_CUDA.lock().unwrap(), next)
}

/// RAII guard that installs a CUDA execution context for its lifetime.
///
/// Captures the previous ambient context on construction and restores it on
/// drop. Acquisition runs in dependency order (device, then primary context,
/// then stream); if any step fails the earlier leases release and nothing is
/// installed.
#[derive(Debug)]
pub struct CudaContextGuard {
    previous: Option<CudaExecutionContext>,
    active: bool,
}

impl CudaContextGuard {
    /// Device 0, primary context, fresh stream
    pub fn new(runtime: &CudaRuntime) -> Result<Self> {
        Self::with_device(runtime, 0)
    }

    /// Chosen device, primary context, fresh stream
    pub fn with_device(runtime: &CudaRuntime, ordinal: u32) -> Result<Self> {
        let device = runtime.devices.acquire_ordinal(ordinal)?;
        let context = runtime.contexts.acquire_for_device(device.handle())?;
        let stream = runtime.streams.acquire(context.handle())?;
        Ok(Self::install(CudaExecutionContext {
            device,
            context,
            stream,
        }))
    }

    /// Chosen device with an already-live stream
    pub fn with_stream(
        runtime: &CudaRuntime,
        ordinal: u32,
        stream: CudaStreamHandle,
    ) -> Result<Self> {
        let device = runtime.devices.acquire_ordinal(ordinal)?;
        let context = runtime.contexts.acquire_for_device(device.handle())?;
        let stream = runtime.streams.acquire_handle(stream)?;
        Ok(Self::install(CudaExecutionContext {
            device,
            context,
            stream,
        }))
    }

    fn install(bundle: CudaExecutionContext) -> Self {
        let previous = replace(Some(bundle));
        Self {
            previous,
            active: true,
        }
    }
}

impl Drop for CudaContextGuard {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            replace(self.previous.take());
        }
    }
}
