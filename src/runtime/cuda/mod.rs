//! CUDA runtime managers
//!
//! Typed managers over the generic pool core, one per payload kind, plus the
//! [`CudaRuntime`] registry that configures and shuts them down in dependency
//! order (device → context → stream/module/buffer).

pub mod buffer;
pub mod context;
pub mod device;
pub mod heap;
pub mod module;
pub mod stream;

use std::sync::Arc;

use crate::backend::CudaSlowOps;
use crate::error::Result;
use crate::pool::PoolConfig;

pub use buffer::{CudaBufferHandle, CudaBufferLease, CudaBufferManager, CudaBufferResource, CudaBufferSpec};
pub use context::{CudaContextHandle, CudaContextLease, CudaContextManager, CudaContextResource, CudaContextSpec};
pub use device::{CudaDeviceHandle, CudaDeviceLease, CudaDeviceManager, CudaDeviceResource, CudaDeviceSpec};
pub use heap::{CudaHeapOps, CudaHeapRegion};
pub use module::{CudaModuleHandle, CudaModuleLease, CudaModuleManager, CudaModuleResource, CudaModuleSpec};
pub use stream::{CudaStreamHandle, CudaStreamLease, CudaStreamManager, CudaStreamResource, CudaStreamSpec};

/// Pool sizing for every CUDA manager
#[derive(Debug, Clone, Copy, Default)]
pub struct CudaRuntimeConfig {
    pub devices: PoolConfig,
    pub contexts: PoolConfig,
    pub streams: PoolConfig,
    pub modules: PoolConfig,
    pub buffers: PoolConfig,
}

/// Registry of the CUDA managers.
///
/// The managers are plain fields; `configure` wires them together in
/// dependency order and `shutdown` unwinds in reverse.
#[derive(Clone, Default)]
pub struct CudaRuntime {
    pub devices: CudaDeviceManager,
    pub contexts: CudaContextManager,
    pub streams: CudaStreamManager,
    pub modules: CudaModuleManager,
    pub buffers: CudaBufferManager,
}

impl CudaRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure every manager against one slow-ops table
    pub fn configure(&self, ops: Arc<dyn CudaSlowOps>, config: CudaRuntimeConfig) -> Result<()> {
        self.devices.configure(config.devices, Arc::clone(&ops))?;
        self.contexts
            .configure(config.contexts, Arc::clone(&ops), self.devices.clone())?;
        self.streams
            .configure(config.streams, Arc::clone(&ops), self.contexts.clone())?;
        self.modules
            .configure(config.modules, Arc::clone(&ops), self.contexts.clone())?;
        self.buffers
            .configure(config.buffers, ops, self.contexts.clone())?;
        Ok(())
    }

    /// Shut every manager down, leaves first.
    ///
    /// A manager with outstanding leases fails the whole call; managers that
    /// already shut down are skipped, so the call can be retried after the
    /// offending leases drop.
    pub fn shutdown(&self) -> Result<()> {
        if self.buffers.is_configured() {
            self.buffers.shutdown()?;
        }
        if self.modules.is_configured() {
            self.modules.shutdown()?;
        }
        if self.streams.is_configured() {
            self.streams.shutdown()?;
        }
        if self.contexts.is_configured() {
            self.contexts.shutdown()?;
        }
        if self.devices.is_configured() {
            self.devices.shutdown()?;
        }
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.devices.is_configured()
    }
}
