//! MPS heap manager and the allocator region provider

use std::sync::Arc;

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::handle::Handle;
use crate::heap::{HeapOps, HeapRegion};
use crate::pool::{PoolConfig, PoolManager, PoolSpec, Shared, StrongLease};

use super::device::{MpsDeviceHandle, MpsDeviceLease, MpsDeviceManager};

pub type MpsHeapHandle = Handle<MpsHeapSpec>;
pub type MpsHeapLease = StrongLease<MpsHeapSpec>;

/// One device heap
#[derive(Debug)]
pub struct MpsHeapResource {
    raw: RawObject,
    size: usize,
    base: usize,
    device: MpsDeviceLease,
}

impl MpsHeapResource {
    pub fn raw(&self) -> RawObject {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Base device address of the heap's backing range
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn device(&self) -> &MpsDeviceLease {
        &self.device
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MpsHeapRequest {
    pub device: MpsDeviceHandle,
    pub size: usize,
}

#[derive(Clone)]
pub struct MpsHeapContext {
    pub ops: Arc<dyn MpsSlowOps>,
    pub devices: MpsDeviceManager,
}

pub struct MpsHeapSpec;

impl PoolSpec for MpsHeapSpec {
    type Payload = MpsHeapResource;
    type Request = MpsHeapRequest;
    type Context = MpsHeapContext;
    type Category = Shared;

    const NAME: &'static str = "MPS heap manager";

    fn validate(request: &MpsHeapRequest) -> Result<()> {
        if !request.device.is_valid() {
            return Err(TesseraError::invalid_argument(
                "device",
                "heap request requires a valid device handle",
            ));
        }
        if request.size == 0 {
            return Err(TesseraError::invalid_argument(
                "size",
                "heap size must be non-zero",
            ));
        }
        Ok(())
    }

    fn create(request: &MpsHeapRequest, context: &MpsHeapContext) -> Result<MpsHeapResource> {
        let device = context.devices.acquire_handle(request.device)?;
        let raw = context.ops.create_heap(device.raw(), request.size)?;
        if raw.is_null() {
            return Err(TesseraError::backend_failure("Metal returned a null heap"));
        }
        let base = context.ops.heap_base_address(raw)?;
        Ok(MpsHeapResource {
            raw,
            size: request.size,
            base,
            device,
        })
    }

    fn destroy(payload: MpsHeapResource, context: &MpsHeapContext) {
        if let Err(err) = context.ops.destroy_heap(payload.raw) {
            panic!("MPS heap destroy failed: {}", err);
        }
    }
}

#[derive(Clone, Default)]
pub struct MpsHeapManager {
    pool: PoolManager<MpsHeapSpec>,
}

impl MpsHeapManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure(
        &self,
        config: PoolConfig,
        ops: Arc<dyn MpsSlowOps>,
        devices: MpsDeviceManager,
    ) -> Result<()> {
        self.pool.configure(config, MpsHeapContext { ops, devices })
    }

    pub fn shutdown(&self) -> Result<()> {
        self.pool.shutdown()
    }

    pub fn is_configured(&self) -> bool {
        self.pool.is_configured()
    }

    pub fn acquire(&self, device: MpsDeviceHandle, size: usize) -> Result<MpsHeapLease> {
        self.pool.acquire(&MpsHeapRequest { device, size })
    }

    pub fn acquire_handle(&self, handle: MpsHeapHandle) -> Result<MpsHeapLease> {
        self.pool.acquire_handle(handle)
    }

    pub fn outstanding(&self) -> usize {
        self.pool.outstanding_strong()
    }
}

/// One device heap serving as a hierarchical-allocator backing region
pub struct MpsHeapRegion {
    raw: RawObject,
    base: usize,
    size: usize,
    ops: Arc<dyn MpsSlowOps>,
}

impl HeapRegion for MpsHeapRegion {
    fn addr(&self) -> usize {
        self.base
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for MpsHeapRegion {
    fn drop(&mut self) {
        if let Err(err) = self.ops.destroy_heap(self.raw) {
            panic!("MPS heap region destroy failed: {}", err);
        }
    }
}

/// Region provider creating device heaps on one pinned device.
///
/// Holds a device lease so the device outlives every region carved on it.
pub struct MpsAllocatorHeapOps {
    ops: Arc<dyn MpsSlowOps>,
    device: MpsDeviceLease,
}

impl MpsAllocatorHeapOps {
    pub fn new(ops: Arc<dyn MpsSlowOps>, device: MpsDeviceLease) -> Self {
        Self { ops, device }
    }
}

impl HeapOps for MpsAllocatorHeapOps {
    type Region = MpsHeapRegion;

    fn allocate_region(&self, size: usize) -> Result<MpsHeapRegion> {
        let raw = self.ops.create_heap(self.device.raw(), size)?;
        if raw.is_null() {
            return Err(TesseraError::out_of_memory(size));
        }
        let base = self.ops.heap_base_address(raw)?;
        Ok(MpsHeapRegion {
            raw,
            base,
            size,
            ops: Arc::clone(&self.ops),
        })
    }
}
