//! Metal (MPS) slow-ops table

use crate::error::Result;

use super::{Architecture, CommandBufferId, RawObject};

/// Metal primitives consumed by the MPS managers.
///
/// Command-buffer ids are per-queue monotonic; `command_buffer_complete` is
/// the completion probe the fence lifetime tracker polls.
pub trait MpsSlowOps: Send + Sync {
    /// Number of Metal devices
    fn device_count(&self) -> Result<u32>;

    /// Open the device with the given ordinal
    fn create_device(&self, ordinal: u32) -> Result<RawObject>;

    /// Close a device
    fn destroy_device(&self, device: RawObject) -> Result<()>;

    /// Architecture family of a device
    fn device_architecture(&self, device: RawObject) -> Result<Architecture>;

    /// Create a command queue on a device
    fn create_command_queue(&self, device: RawObject) -> Result<RawObject>;

    /// Destroy a command queue
    fn destroy_command_queue(&self, queue: RawObject) -> Result<()>;

    /// Create a shared event on a device
    fn create_event(&self, device: RawObject) -> Result<RawObject>;

    /// Destroy an event
    fn destroy_event(&self, event: RawObject) -> Result<()>;

    /// Create a fence on a device
    fn create_fence(&self, device: RawObject) -> Result<RawObject>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: RawObject) -> Result<()>;

    /// Create a device heap of the given byte size
    fn create_heap(&self, device: RawObject, size: usize) -> Result<RawObject>;

    /// Destroy a device heap
    fn destroy_heap(&self, heap: RawObject) -> Result<()>;

    /// Base device address of a heap's backing range
    fn heap_base_address(&self, heap: RawObject) -> Result<usize>;

    /// Compile or load a shader library on a device
    fn create_library(&self, device: RawObject, source: &str) -> Result<RawObject>;

    /// Destroy a library
    fn destroy_library(&self, library: RawObject) -> Result<()>;

    /// Build a compute pipeline state for a named function in a library
    fn create_pipeline_state(&self, library: RawObject, function: &str) -> Result<RawObject>;

    /// Destroy a pipeline state
    fn destroy_pipeline_state(&self, pipeline: RawObject) -> Result<()>;

    /// Create a graph object on a device
    fn create_graph(&self, device: RawObject) -> Result<RawObject>;

    /// Destroy a graph
    fn destroy_graph(&self, graph: RawObject) -> Result<()>;

    /// Suballocate a buffer out of a device heap
    fn allocate_buffer(&self, heap: RawObject, size: usize) -> Result<RawObject>;

    /// Release a buffer
    fn free_buffer(&self, buffer: RawObject) -> Result<()>;

    /// Record a submission on a queue, returning its command-buffer id
    fn record_submit(&self, queue: RawObject) -> Result<CommandBufferId>;

    /// Whether the given command buffer has drained on its queue
    fn command_buffer_complete(&self, queue: RawObject, id: CommandBufferId) -> bool;
}
