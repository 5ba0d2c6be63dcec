//! Backend storages and the type-erased storage lease
//!
//! A storage is a sized, typed span of device (or host) memory carved out of
//! a hierarchical slot allocator. Call sites that must hold a storage whose
//! backend is decided at runtime use [`AnyStorageLease`], a tagged union over
//! the backend-specific leases.

pub mod cpu;
pub mod cuda;
pub mod mps;

use serde::{Deserialize, Serialize};

use crate::backend::Execution;
use crate::dtype::DType;
use crate::error::{Result, TesseraError};
use crate::heap::{BufferView, HeapOps, HierarchicalSlotAllocator};

pub use cpu::{CpuStorageHandle, CpuStorageLease, CpuStorageManager, CpuStorageSpec};
pub use cuda::{CudaStorageHandle, CudaStorageLease, CudaStorageManager, CudaStorageSpec};
pub use mps::{MpsStorageHandle, MpsStorageLease, MpsStorageManager, MpsStorageSpec};

/// One storage allocation: a view into a backing heap region plus its shape
/// in elements
#[derive(Debug, Clone, Copy)]
pub struct StorageResource {
    view: BufferView,
    bytes: usize,
    numel: usize,
    dtype: DType,
}

impl StorageResource {
    pub fn view(&self) -> BufferView {
        self.view
    }

    /// Allocated length in bytes (may exceed `numel * dtype` for alignment)
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn numel(&self) -> usize {
        self.numel
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

/// Parameters for creating a storage
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StorageRequest {
    pub numel: usize,
    pub dtype: DType,
    /// Byte alignment for the allocation size; 0 means natural element size
    pub alignment: usize,
}

impl StorageRequest {
    pub fn new(numel: usize, dtype: DType) -> Self {
        Self {
            numel,
            dtype,
            alignment: 0,
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }
}

pub(crate) fn validate_request(request: &StorageRequest) -> Result<()> {
    if request.numel == 0 {
        return Err(TesseraError::invalid_argument(
            "numel",
            "storage request requires non-zero numel",
        ));
    }
    if request.alignment != 0 && !request.alignment.is_power_of_two() {
        return Err(TesseraError::invalid_argument(
            "alignment",
            "alignment must be zero or a power of two",
        ));
    }
    Ok(())
}

pub(crate) fn create_storage<O: HeapOps>(
    allocator: &HierarchicalSlotAllocator<O>,
    request: &StorageRequest,
) -> Result<StorageResource> {
    let natural = request.numel * request.dtype.size_bytes();
    let bytes = if request.alignment > 1 {
        natural.div_ceil(request.alignment) * request.alignment
    } else {
        natural
    };
    let view = allocator.allocate(bytes)?;
    Ok(StorageResource {
        view,
        bytes,
        numel: request.numel,
        dtype: request.dtype,
    })
}

pub(crate) fn destroy_storage<O: HeapOps>(
    allocator: &HierarchicalSlotAllocator<O>,
    payload: StorageResource,
) {
    if let Err(err) = allocator.deallocate(payload.view, payload.bytes) {
        panic!("storage deallocation failed: {}", err);
    }
}

/// Type-erased storage lease.
///
/// Construction goes through `erase` (or the `From` impls); there is no
/// downcast without a tag check.
#[derive(Debug, Clone, Default)]
pub enum AnyStorageLease {
    #[default]
    Empty,
    Cpu(CpuStorageLease),
    Cuda(CudaStorageLease),
    Mps(MpsStorageLease),
}

impl AnyStorageLease {
    /// Wrap a backend-specific lease
    pub fn erase<L: Into<AnyStorageLease>>(lease: L) -> Self {
        lease.into()
    }

    /// Whether a lease is held
    pub fn valid(&self) -> bool {
        !matches!(self, AnyStorageLease::Empty)
    }

    /// Backend of the held lease; Cpu for the empty lease
    pub fn execution(&self) -> Execution {
        match self {
            AnyStorageLease::Empty | AnyStorageLease::Cpu(_) => Execution::Cpu,
            AnyStorageLease::Cuda(_) => Execution::Cuda,
            AnyStorageLease::Mps(_) => Execution::Mps,
        }
    }

    pub fn as_cpu(&self) -> Option<&CpuStorageLease> {
        match self {
            AnyStorageLease::Cpu(lease) => Some(lease),
            _ => None,
        }
    }

    pub fn as_cuda(&self) -> Option<&CudaStorageLease> {
        match self {
            AnyStorageLease::Cuda(lease) => Some(lease),
            _ => None,
        }
    }

    pub fn as_mps(&self) -> Option<&MpsStorageLease> {
        match self {
            AnyStorageLease::Mps(lease) => Some(lease),
            _ => None,
        }
    }

    /// The held storage, backend-independent
    pub fn storage(&self) -> Option<&StorageResource> {
        match self {
            AnyStorageLease::Empty => None,
            AnyStorageLease::Cpu(lease) => Some(lease.payload()),
            AnyStorageLease::Cuda(lease) => Some(lease.payload()),
            AnyStorageLease::Mps(lease) => Some(lease.payload()),
        }
    }

    pub fn numel(&self) -> Option<usize> {
        self.storage().map(|storage| storage.numel())
    }

    pub fn dtype(&self) -> Option<DType> {
        self.storage().map(|storage| storage.dtype())
    }
}

impl From<CpuStorageLease> for AnyStorageLease {
    fn from(lease: CpuStorageLease) -> Self {
        AnyStorageLease::Cpu(lease)
    }
}

impl From<CudaStorageLease> for AnyStorageLease {
    fn from(lease: CudaStorageLease) -> Self {
        AnyStorageLease::Cuda(lease)
    }
}

impl From<MpsStorageLease> for AnyStorageLease {
    fn from(lease: MpsStorageLease) -> Self {
        AnyStorageLease::Mps(lease)
    }
}
