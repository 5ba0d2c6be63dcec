//! # Tessera - Tensor Runtime Resource Kernel
//!
//! Tessera is the accelerator-agnostic resource management core of a tensor
//! runtime: pooled, generation-tagged identity for scarce device objects,
//! RAII leases with per-type ownership disciplines, fence-deferred release of
//! GPU hazards, and a hierarchical slot allocator backing device memory.
//!
//! ## Features
//!
//! - **Handle/lease pools**: index-based identity with generation-tagged reuse
//! - **Four ownership disciplines**: raw, unique, shared, weak-shared
//! - **Fence lifetime tracking**: FIFO hazard release per command queue
//! - **Hierarchical slot allocator**: fixed level sizes with split and merge
//! - **Pluggable backends**: CPU / CUDA / Metal via slow-op tables
//! - **Scoped execution contexts**: process-global ambient state with guards
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   Typed runtimes                     │
//! │   CudaRuntime      MpsRuntime         CpuRuntime     │
//! │   (device, ctx,    (device, queue,    (device)       │
//! │    stream, module,  event, fence,                    │
//! │    buffer)          heap, library,                   │
//! │                     pipeline, graph)                 │
//! ├──────────────────────────────────────────────────────┤
//! │  PoolManager  ·  ControlBlocks  ·  Leases  ·  Handles│
//! ├──────────────────────────────────────────────────────┤
//! │  HierarchicalSlotAllocator  ·  HeapRegions  ·  Views │
//! └──────────────────────────────────────────────────────┘
//!              │ slow-op tables (one per backend)
//!              ▼
//!        CUDA driver / Metal / host mappings
//! ```

// Core modules
pub mod backend;
pub mod context;
pub mod dtype;
pub mod error;
pub mod handle;
pub mod heap;
pub mod pool;
pub mod runtime;
pub mod storage;
pub mod tensor;

// Main API re-exports
pub use backend::{
    Architecture, CommandBufferId, CudaSlowOps, Execution, HostBacking, HostHeapOps, HostRegion,
    MpsSlowOps, RawObject,
};
pub use dtype::DType;
pub use error::{Result, TesseraError};
pub use handle::{Handle, INVALID_INDEX};
pub use heap::{BufferView, HeapOps, HeapRegion, HierarchicalSlotAllocator};
pub use pool::{
    BlockVec, ControlBlock, LeaseCategory, PoolConfig, PoolManager, PoolSpec, Raw, Shared,
    SharedLeaseCategory, StrongLease, Unique, WeakLease, WeakShared, WeakableLeaseCategory,
};
pub use runtime::{
    cpu::CpuRuntime, cuda::CudaRuntime, mps::MpsRuntime, CpuRuntimeConfig, CudaRuntimeConfig,
    MpsRuntimeConfig,
};
pub use storage::{AnyStorageLease, StorageRequest, StorageResource};
pub use tensor::{DenseTensorImpl, DenseTensorManager, DenseTensorRequest};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
