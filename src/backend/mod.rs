//! Backend abstraction
//!
//! The core never calls an OS or GPU API directly: each backend supplies a
//! slow-ops table (one method per primitive) that the managers invoke from
//! their create/destroy callbacks. Backend objects cross the boundary as
//! pointer-sized opaque identifiers so no backend ABI leaks into the core's
//! public types.

pub mod cuda;
pub mod host;
pub mod mps;

use serde::{Deserialize, Serialize};

pub use cuda::CudaSlowOps;
pub use host::{HostBacking, HostHeapOps, HostRegion};
pub use mps::MpsSlowOps;

/// Which backend executes a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Execution {
    Cpu,
    Cuda,
    Mps,
}

impl Execution {
    /// Human-readable backend name
    pub fn name(&self) -> &'static str {
        match self {
            Execution::Cpu => "cpu",
            Execution::Cuda => "cuda",
            Execution::Mps => "mps",
        }
    }
}

/// Device architecture family reported by the backend probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Architecture {
    #[default]
    Generic,
    AppleFamily7,
    AppleFamily8,
    AppleFamily9,
    CudaSm70,
    CudaSm80,
    CudaSm90,
}

/// Pointer-sized opaque identifier for a backend object.
///
/// Only the slow-ops tables interpret the value; the core stores and passes
/// it around. Zero is the null object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct RawObject(pub usize);

impl RawObject {
    /// The null object
    pub const NULL: RawObject = RawObject(0);

    /// Whether this identifies an object
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Monotonic identifier for a submitted command buffer on one queue.
///
/// Zero is reserved for "no command buffer attached".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommandBufferId(pub u64);

impl CommandBufferId {
    /// Whether the id refers to a real submission
    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_object_null() {
        assert!(RawObject::NULL.is_null());
        assert!(!RawObject(0x1000).is_null());
        assert_eq!(RawObject::default(), RawObject::NULL);
    }

    #[test]
    fn test_execution_names() {
        assert_eq!(Execution::Cpu.name(), "cpu");
        assert_eq!(Execution::Cuda.name(), "cuda");
        assert_eq!(Execution::Mps.name(), "mps");
    }
}
