//! CUDA heap-region provider for the hierarchical allocator

use std::sync::Arc;

use crate::backend::{CudaSlowOps, RawObject};
use crate::error::{Result, TesseraError};
use crate::heap::{HeapOps, HeapRegion};

use super::context::CudaContextLease;

/// One device allocation serving as an allocator backing region.
///
/// Device addresses come straight from the driver allocation; freeing happens
/// on drop.
pub struct CudaHeapRegion {
    raw: RawObject,
    size: usize,
    ops: Arc<dyn CudaSlowOps>,
}

impl HeapRegion for CudaHeapRegion {
    fn addr(&self) -> usize {
        self.raw.0
    }

    fn size(&self) -> usize {
        self.size
    }
}

impl Drop for CudaHeapRegion {
    fn drop(&mut self) {
        if let Err(err) = self.ops.free_buffer(self.raw) {
            panic!("CUDA heap region free failed: {}", err);
        }
    }
}

/// Region provider allocating device memory in one pinned context.
///
/// Holds a context lease so the context outlives every region carved from it.
pub struct CudaHeapOps {
    ops: Arc<dyn CudaSlowOps>,
    context: CudaContextLease,
}

impl CudaHeapOps {
    pub fn new(ops: Arc<dyn CudaSlowOps>, context: CudaContextLease) -> Self {
        Self { ops, context }
    }
}

impl HeapOps for CudaHeapOps {
    type Region = CudaHeapRegion;

    fn allocate_region(&self, size: usize) -> Result<CudaHeapRegion> {
        let raw = self.ops.allocate_buffer(self.context.raw(), size)?;
        if raw.is_null() {
            return Err(TesseraError::out_of_memory(size));
        }
        Ok(CudaHeapRegion {
            raw,
            size,
            ops: Arc::clone(&self.ops),
        })
    }
}
