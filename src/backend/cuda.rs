//! CUDA slow-ops table
//!
//! One method per driver primitive the managers need. The real implementation
//! shims into the CUDA driver; tests inject fakes. All objects cross the
//! boundary as [`RawObject`]s.

use crate::error::Result;

use super::{Architecture, RawObject};

/// Driver primitives consumed by the CUDA managers.
///
/// Implementations must be callable from any thread; every call that hands
/// back an object must hand back a non-null one or fail.
pub trait CudaSlowOps: Send + Sync {
    /// Number of devices visible to the driver
    fn device_count(&self) -> Result<u32>;

    /// Open the device with the given ordinal
    fn create_device(&self, ordinal: u32) -> Result<RawObject>;

    /// Close a device
    fn destroy_device(&self, device: RawObject) -> Result<()>;

    /// Architecture family of a device
    fn device_architecture(&self, device: RawObject) -> Result<Architecture>;

    /// Retain the device's primary context
    fn retain_primary_context(&self, device: RawObject) -> Result<RawObject>;

    /// Release a primary context
    fn release_primary_context(&self, context: RawObject) -> Result<()>;

    /// Create a stream in a context
    fn create_stream(&self, context: RawObject) -> Result<RawObject>;

    /// Destroy a stream
    fn destroy_stream(&self, stream: RawObject) -> Result<()>;

    /// Load a module from a compiled image or source name
    fn create_module(&self, context: RawObject, image: &str) -> Result<RawObject>;

    /// Unload a module
    fn destroy_module(&self, module: RawObject) -> Result<()>;

    /// Look up a kernel function inside a loaded module
    fn get_function(&self, module: RawObject, name: &str) -> Result<RawObject>;

    /// Allocate device memory in a context
    fn allocate_buffer(&self, context: RawObject, size: usize) -> Result<RawObject>;

    /// Free device memory
    fn free_buffer(&self, buffer: RawObject) -> Result<()>;
}
