//! Fake backend slow-ops tables for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tessera::backend::{Architecture, CommandBufferId, CudaSlowOps, MpsSlowOps, RawObject};
use tessera::error::{Result, TesseraError};

fn next_object(counter: &AtomicUsize) -> RawObject {
    RawObject(counter.fetch_add(0x10, Ordering::SeqCst))
}

/// In-memory CUDA driver double. Objects are synthetic ids; create/destroy
/// pairs are counted so tests can assert teardown balance.
pub struct FakeCudaOps {
    next: AtomicUsize,
    pub created_devices: AtomicUsize,
    pub destroyed_devices: AtomicUsize,
    pub created_streams: AtomicUsize,
    pub destroyed_streams: AtomicUsize,
    pub created_modules: AtomicUsize,
    pub destroyed_modules: AtomicUsize,
    pub created_buffers: AtomicUsize,
    pub destroyed_buffers: AtomicUsize,
    pub fail_stream_create: AtomicUsize,
}

impl Default for FakeCudaOps {
    fn default() -> Self {
        Self {
            next: AtomicUsize::new(0x1000),
            created_devices: AtomicUsize::new(0),
            destroyed_devices: AtomicUsize::new(0),
            created_streams: AtomicUsize::new(0),
            destroyed_streams: AtomicUsize::new(0),
            created_modules: AtomicUsize::new(0),
            destroyed_modules: AtomicUsize::new(0),
            created_buffers: AtomicUsize::new(0),
            destroyed_buffers: AtomicUsize::new(0),
            fail_stream_create: AtomicUsize::new(0),
        }
    }
}

impl FakeCudaOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` stream creations fail
    pub fn fail_next_stream_creates(&self, count: usize) {
        self.fail_stream_create.store(count, Ordering::SeqCst);
    }
}

impl CudaSlowOps for FakeCudaOps {
    fn device_count(&self) -> Result<u32> {
        Ok(2)
    }

    fn create_device(&self, _ordinal: u32) -> Result<RawObject> {
        self.created_devices.fetch_add(1, Ordering::SeqCst);
        Ok(next_object(&self.next))
    }

    fn destroy_device(&self, _device: RawObject) -> Result<()> {
        self.destroyed_devices.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn device_architecture(&self, _device: RawObject) -> Result<Architecture> {
        Ok(Architecture::CudaSm80)
    }

    fn retain_primary_context(&self, _device: RawObject) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn release_primary_context(&self, _context: RawObject) -> Result<()> {
        Ok(())
    }

    fn create_stream(&self, _context: RawObject) -> Result<RawObject> {
        let pending = self.fail_stream_create.load(Ordering::SeqCst);
        if pending > 0 {
            self.fail_stream_create.store(pending - 1, Ordering::SeqCst);
            return Err(TesseraError::backend_failure("injected stream failure"));
        }
        self.created_streams.fetch_add(1, Ordering::SeqCst);
        Ok(next_object(&self.next))
    }

    fn destroy_stream(&self, _stream: RawObject) -> Result<()> {
        self.destroyed_streams.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_module(&self, _context: RawObject, _image: &str) -> Result<RawObject> {
        self.created_modules.fetch_add(1, Ordering::SeqCst);
        Ok(next_object(&self.next))
    }

    fn destroy_module(&self, _module: RawObject) -> Result<()> {
        self.destroyed_modules.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_function(&self, _module: RawObject, _name: &str) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn allocate_buffer(&self, _context: RawObject, size: usize) -> Result<RawObject> {
        self.created_buffers.fetch_add(1, Ordering::SeqCst);
        // Hand out address-like ids spaced by the allocation size.
        Ok(RawObject(
            self.next.fetch_add(size.max(0x10), Ordering::SeqCst),
        ))
    }

    fn free_buffer(&self, _buffer: RawObject) -> Result<()> {
        self.destroyed_buffers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory Metal double with per-queue submission bookkeeping.
pub struct FakeMpsOps {
    next: AtomicUsize,
    /// queue object -> last submitted command-buffer id
    submitted: Mutex<HashMap<usize, u64>>,
    /// queue object -> highest completed command-buffer id
    completed: Mutex<HashMap<usize, u64>>,
    pub created_fences: AtomicUsize,
    pub destroyed_fences: AtomicUsize,
    pub created_queues: AtomicUsize,
    pub destroyed_queues: AtomicUsize,
    pub created_heaps: AtomicUsize,
    pub destroyed_heaps: AtomicUsize,
}

impl Default for FakeMpsOps {
    fn default() -> Self {
        Self {
            next: AtomicUsize::new(0x8000),
            submitted: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
            created_fences: AtomicUsize::new(0),
            destroyed_fences: AtomicUsize::new(0),
            created_queues: AtomicUsize::new(0),
            destroyed_queues: AtomicUsize::new(0),
            created_heaps: AtomicUsize::new(0),
            destroyed_heaps: AtomicUsize::new(0),
        }
    }
}

impl FakeMpsOps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark every submission up to and including `id` as drained
    pub fn complete_through(&self, queue: RawObject, id: CommandBufferId) {
        self.completed.lock().unwrap().insert(queue.0, id.0);
    }
}

impl MpsSlowOps for FakeMpsOps {
    fn device_count(&self) -> Result<u32> {
        Ok(1)
    }

    fn create_device(&self, _ordinal: u32) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn destroy_device(&self, _device: RawObject) -> Result<()> {
        Ok(())
    }

    fn device_architecture(&self, _device: RawObject) -> Result<Architecture> {
        Ok(Architecture::AppleFamily8)
    }

    fn create_command_queue(&self, _device: RawObject) -> Result<RawObject> {
        self.created_queues.fetch_add(1, Ordering::SeqCst);
        Ok(next_object(&self.next))
    }

    fn destroy_command_queue(&self, _queue: RawObject) -> Result<()> {
        self.destroyed_queues.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_event(&self, _device: RawObject) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn destroy_event(&self, _event: RawObject) -> Result<()> {
        Ok(())
    }

    fn create_fence(&self, _device: RawObject) -> Result<RawObject> {
        self.created_fences.fetch_add(1, Ordering::SeqCst);
        Ok(next_object(&self.next))
    }

    fn destroy_fence(&self, _fence: RawObject) -> Result<()> {
        self.destroyed_fences.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn create_heap(&self, _device: RawObject, size: usize) -> Result<RawObject> {
        self.created_heaps.fetch_add(1, Ordering::SeqCst);
        Ok(RawObject(
            self.next.fetch_add(size.max(0x10), Ordering::SeqCst),
        ))
    }

    fn destroy_heap(&self, _heap: RawObject) -> Result<()> {
        self.destroyed_heaps.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn heap_base_address(&self, heap: RawObject) -> Result<usize> {
        Ok(heap.0)
    }

    fn create_library(&self, _device: RawObject, _source: &str) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn destroy_library(&self, _library: RawObject) -> Result<()> {
        Ok(())
    }

    fn create_pipeline_state(&self, _library: RawObject, _function: &str) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn destroy_pipeline_state(&self, _pipeline: RawObject) -> Result<()> {
        Ok(())
    }

    fn create_graph(&self, _device: RawObject) -> Result<RawObject> {
        Ok(next_object(&self.next))
    }

    fn destroy_graph(&self, _graph: RawObject) -> Result<()> {
        Ok(())
    }

    fn allocate_buffer(&self, _heap: RawObject, size: usize) -> Result<RawObject> {
        Ok(RawObject(
            self.next.fetch_add(size.max(0x10), Ordering::SeqCst),
        ))
    }

    fn free_buffer(&self, _buffer: RawObject) -> Result<()> {
        Ok(())
    }

    fn record_submit(&self, queue: RawObject) -> Result<CommandBufferId> {
        let mut submitted = self.submitted.lock().unwrap();
        let next = submitted.entry(queue.0).or_insert(0);
        *next += 1;
        Ok(CommandBufferId(*next))
    }

    fn command_buffer_complete(&self, queue: RawObject, id: CommandBufferId) -> bool {
        self.completed
            .lock()
            .unwrap()
            .get(&queue.0)
            .map(|&done| id.0 <= done)
            .unwrap_or(false)
    }
}
