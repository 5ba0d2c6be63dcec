//! Per-queue fence lifetime tracking
//!
//! Any lease enqueued as a GPU dependency stays tracked here until its
//! command buffer signals; only then does its RAII release run. Releases are
//! strictly FIFO in track order: a hazard that has not signalled blocks every
//! later hazard on the queue, even ones that have.

use crate::backend::{MpsSlowOps, RawObject};
use crate::error::{Result, TesseraError};

use super::command_queue::MpsCommandQueueHandle;
use super::device::MpsDeviceHandle;
use super::fence::{MpsFenceLease, MpsFenceManager, MpsFenceRequest, MpsFenceResource};

/// Ordered queue of fence hazards awaiting completion on one command queue.
///
/// Entries released out of the head become tombstones; the vector is
/// physically compacted once the head passes the halfway mark.
pub struct FenceLifetimeManager {
    fences: Option<MpsFenceManager>,
    device: MpsDeviceHandle,
    queue: MpsCommandQueueHandle,
    queue_raw: RawObject,
    hazards: Vec<Option<MpsFenceLease>>,
    head: usize,
}

impl Default for FenceLifetimeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FenceLifetimeManager {
    /// Create an unconfigured tracker
    pub fn new() -> Self {
        Self {
            fences: None,
            device: MpsDeviceHandle::invalid(),
            queue: MpsCommandQueueHandle::invalid(),
            queue_raw: RawObject::NULL,
            hazards: Vec::new(),
            head: 0,
        }
    }

    /// Bind the tracker to its queue and fence pool.
    ///
    /// Rebinding with hazards outstanding is forbidden.
    pub fn configure(
        &mut self,
        fences: MpsFenceManager,
        device: MpsDeviceHandle,
        queue: MpsCommandQueueHandle,
        queue_raw: RawObject,
    ) -> Result<()> {
        if !self.is_empty() && queue != self.queue {
            return Err(TesseraError::invalid_state(
                "fence lifetime tracker cannot be rebound while hazards are outstanding",
            ));
        }
        self.fences = Some(fences);
        self.device = device;
        self.queue = queue;
        self.queue_raw = queue_raw;
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.fences.is_some() && self.queue.is_valid()
    }

    /// Queue this tracker serves
    pub fn queue(&self) -> MpsCommandQueueHandle {
        self.queue
    }

    /// Obtain a fence bound to this tracker's queue
    pub fn acquire(&self) -> Result<MpsFenceLease> {
        let fences = self.fences.as_ref().ok_or_else(|| {
            TesseraError::invalid_state("fence lifetime tracker requires a fence manager")
        })?;
        if !self.queue.is_valid() {
            return Err(TesseraError::invalid_state(
                "fence lifetime tracker requires a valid command queue",
            ));
        }
        fences.acquire(&MpsFenceRequest {
            device: self.device,
            queue: self.queue,
            queue_raw: self.queue_raw,
        })
    }

    /// Track a lease until its command buffer signals.
    ///
    /// The fence must carry a command buffer already and must be bound to
    /// this tracker's queue.
    pub fn track(&mut self, lease: MpsFenceLease) -> Result<()> {
        if lease.queue() != self.queue {
            return Err(TesseraError::invalid_argument(
                "lease",
                "fence hazard is bound to a different command queue",
            ));
        }
        if !lease.has_command_buffer() {
            return Err(TesseraError::invalid_state(
                "fence hazard must have a command buffer before tracking",
            ));
        }
        self.hazards.push(Some(lease));
        Ok(())
    }

    /// Release the contiguous prefix of hazards whose probe reports complete.
    ///
    /// Returns the number released. Releases happen in track order in one
    /// batch; the first incomplete hazard stops the scan.
    pub fn release_ready<F>(&mut self, is_complete: F) -> usize
    where
        F: Fn(&MpsFenceResource) -> bool,
    {
        let mut released = 0;
        while self.head < self.hazards.len() {
            let ready = match &self.hazards[self.head] {
                Some(lease) => is_complete(lease.payload()),
                None => true,
            };
            if !ready {
                break;
            }
            self.hazards[self.head].take();
            self.head += 1;
            released += 1;
        }
        self.compact_if_needed();
        released
    }

    /// Release ready hazards using the backend's completion probe
    pub fn release_ready_with(&mut self, ops: &dyn MpsSlowOps) -> usize {
        self.release_ready(|fence| fence.is_complete(ops))
    }

    /// Drop every tracked hazard unconditionally (shutdown path)
    pub fn clear(&mut self) {
        self.hazards.clear();
        self.head = 0;
    }

    /// Number of hazards still tracked
    pub fn len(&self) -> usize {
        self.hazards.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compact_if_needed(&mut self) {
        if self.head == 0 {
            return;
        }
        if self.head >= self.hazards.len() {
            self.hazards.clear();
            self.head = 0;
            return;
        }
        if self.head < self.hazards.len() / 2 {
            return;
        }
        self.hazards.drain(..self.head);
        self.head = 0;
    }
}

impl std::fmt::Debug for FenceLifetimeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FenceLifetimeManager")
            .field("queue", &self.queue)
            .field("tracked", &self.len())
            .finish()
    }
}
