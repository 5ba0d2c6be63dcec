//! MPS runtime managers
//!
//! Typed managers over the generic pool core plus the per-queue fence
//! lifetime tracker. The [`MpsRuntime`] registry configures everything in
//! dependency order (device → fence → command queue → the rest) and unwinds
//! in reverse.

pub mod buffer;
pub mod command_queue;
pub mod device;
pub mod event;
pub mod fence;
pub mod fence_lifetime;
pub mod graph;
pub mod heap;
pub mod library;
pub mod pipeline;

use std::sync::Arc;

use crate::backend::MpsSlowOps;
use crate::error::Result;
use crate::pool::PoolConfig;

pub use buffer::{MpsBufferHandle, MpsBufferLease, MpsBufferManager, MpsBufferResource, MpsBufferSpec};
pub use command_queue::{
    MpsCommandQueueHandle, MpsCommandQueueLease, MpsCommandQueueManager, MpsCommandQueueResource,
    MpsCommandQueueSpec,
};
pub use device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager, MpsDeviceResource, MpsDeviceSpec};
pub use event::{MpsEventHandle, MpsEventLease, MpsEventManager, MpsEventResource, MpsEventSpec};
pub use fence::{MpsFenceHandle, MpsFenceLease, MpsFenceManager, MpsFenceRequest, MpsFenceResource, MpsFenceSpec};
pub use fence_lifetime::FenceLifetimeManager;
pub use graph::{MpsGraphHandle, MpsGraphLease, MpsGraphManager, MpsGraphResource, MpsGraphSpec};
pub use heap::{
    MpsAllocatorHeapOps, MpsHeapHandle, MpsHeapLease, MpsHeapManager, MpsHeapRegion, MpsHeapResource,
    MpsHeapSpec,
};
pub use library::{MpsLibraryHandle, MpsLibraryLease, MpsLibraryManager, MpsLibraryResource, MpsLibrarySpec};
pub use pipeline::{MpsPipelineHandle, MpsPipelineLease, MpsPipelineManager, MpsPipelineResource, MpsPipelineSpec};

/// Pool sizing for every MPS manager
#[derive(Debug, Clone, Copy, Default)]
pub struct MpsRuntimeConfig {
    pub devices: PoolConfig,
    pub command_queues: PoolConfig,
    pub events: PoolConfig,
    pub fences: PoolConfig,
    pub heaps: PoolConfig,
    pub libraries: PoolConfig,
    pub pipelines: PoolConfig,
    pub graphs: PoolConfig,
    pub buffers: PoolConfig,
}

/// Registry of the MPS managers
#[derive(Clone, Default)]
pub struct MpsRuntime {
    pub devices: MpsDeviceManager,
    pub command_queues: MpsCommandQueueManager,
    pub events: MpsEventManager,
    pub fences: MpsFenceManager,
    pub heaps: MpsHeapManager,
    pub libraries: MpsLibraryManager,
    pub pipelines: MpsPipelineManager,
    pub graphs: MpsGraphManager,
    pub buffers: MpsBufferManager,
}

impl MpsRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure every manager against one slow-ops table
    pub fn configure(&self, ops: Arc<dyn MpsSlowOps>, config: MpsRuntimeConfig) -> Result<()> {
        self.devices.configure(config.devices, Arc::clone(&ops))?;
        self.fences
            .configure(config.fences, Arc::clone(&ops), self.devices.clone())?;
        self.command_queues.configure(
            config.command_queues,
            Arc::clone(&ops),
            self.devices.clone(),
            self.fences.clone(),
        )?;
        self.events
            .configure(config.events, Arc::clone(&ops), self.devices.clone())?;
        self.heaps
            .configure(config.heaps, Arc::clone(&ops), self.devices.clone())?;
        self.libraries
            .configure(config.libraries, Arc::clone(&ops), self.devices.clone())?;
        self.pipelines
            .configure(config.pipelines, Arc::clone(&ops), self.libraries.clone())?;
        self.graphs
            .configure(config.graphs, Arc::clone(&ops), self.devices.clone())?;
        self.buffers
            .configure(config.buffers, ops, self.heaps.clone())?;
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
        if self.graphs.is_configured() {
            self.graphs.shutdown()?;
        }
        if self.pipelines.is_configured() {
            self.pipelines.shutdown()?;
        }
        if self.libraries.is_configured() {
            self.libraries.shutdown()?;
        }
        if self.heaps.is_configured() {
            self.heaps.shutdown()?;
        }
        if self.events.is_configured() {
            self.events.shutdown()?;
        }
        if self.command_queues.is_configured() {
            self.command_queues.shutdown()?;
        }
        if self.fences.is_configured() {
            self.fences.shutdown()?;
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
