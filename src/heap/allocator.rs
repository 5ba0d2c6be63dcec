//! Multi-level slot allocator with split and merge-upward

use std::sync::Mutex;

use crate::error::{Result, TesseraError};

use super::view::BufferView;
use super::{HeapOps, HeapRegion};

const NO_CHILD: u32 = u32::MAX;
const NO_PARENT: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    InUse,
    Split,
}

/// One slot at one level. Children are created on first split and reused on
/// re-split; a merged parent keeps its `child_begin` so the children never
/// need recreating.
#[derive(Debug, Clone, Copy)]
struct SlotCell {
    state: SlotState,
    addr: usize,
    child_begin: u32,
    parent: u32,
    region: u32,
}

#[derive(Debug)]
struct Layer {
    slot_size: usize,
    slots: Vec<SlotCell>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// Position choice for one level of an allocation plan
#[derive(Debug, Clone, Copy)]
enum LayerPos {
    /// Start at an existing slot index of that level
    Existing(u32),
    /// Start at the first child of the parent chosen one level up
    /// (the children may not exist until the split executes)
    FirstChild,
}

struct RegionEntry<R> {
    region: R,
    /// Bytes actually carved into level-0 slots (a multiple of the level-0
    /// slot size; the provider may hand back more than requested)
    usable: usize,
}

struct AllocatorState<O: HeapOps> {
    ops: O,
    levels: Vec<usize>,
    regions: Vec<RegionEntry<O::Region>>,
    layers: Vec<Layer>,
}

/// Hierarchical slot allocator.
///
/// Requests decompose greedily into per-level slot counts; the allocator
/// places the resulting contiguous span with a tail search (backward from the
/// end of level 0), falls back to a forward first-fit, and finally expands the
/// backing storage and retries once. Every public operation runs under one
/// internal mutex.
pub struct HierarchicalSlotAllocator<O: HeapOps> {
    inner: Mutex<AllocatorState<O>>,
}

impl<O: HeapOps> HierarchicalSlotAllocator<O> {
    /// Create an allocator over the given level sizes.
    ///
    /// Levels must be non-empty, descending (non-increasing), and each level
    /// must divide its predecessor exactly so children tile their parent.
    pub fn new(ops: O, levels: Vec<usize>) -> Result<Self> {
        if levels.is_empty() {
            return Err(TesseraError::invalid_argument(
                "levels",
                "at least one level is required",
            ));
        }
        for (i, &size) in levels.iter().enumerate() {
            if size == 0 {
                return Err(TesseraError::invalid_argument(
                    "levels",
                    "level sizes must be non-zero",
                ));
            }
            if i > 0 {
                let prev = levels[i - 1];
                if size > prev {
                    return Err(TesseraError::invalid_argument(
                        "levels",
                        "level sizes must be non-increasing",
                    ));
                }
                if prev % size != 0 {
                    return Err(TesseraError::invalid_argument(
                        "levels",
                        "each level size must divide its predecessor",
                    ));
                }
            }
        }
        let layers = levels
            .iter()
            .map(|&slot_size| Layer {
                slot_size,
                slots: Vec::new(),
            })
            .collect();
        Ok(Self {
            inner: Mutex::new(AllocatorState {
                ops,
                levels,
                regions: Vec::new(),
                layers,
            }),
        })
    }

    /// Add a backing region of at least `bytes` bytes (rounded up to a whole
    /// number of level-0 slots)
    pub fn add_region(&self, bytes: usize) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.add_region(bytes)?;
        Ok(())
    }

    /// Allocate `size` bytes; the returned view covers exactly the request.
    pub fn allocate(&self, size: usize) -> Result<BufferView> {
        if size == 0 {
            return Err(TesseraError::invalid_argument(
                "size",
                "allocation size must be non-zero",
            ));
        }
        let mut state = self.inner.lock().unwrap();
        let rs = state.decompose(size);

        if let Some(plan) = state.find_plan(&rs, Direction::Backward) {
            return Ok(state.execute(&plan, &rs, size));
        }
        if let Some(plan) = state.find_plan(&rs, Direction::Forward) {
            return Ok(state.execute(&plan, &rs, size));
        }
        state.expand_for(&rs)?;
        if let Some(plan) = state.find_plan(&rs, Direction::Backward) {
            return Ok(state.execute(&plan, &rs, size));
        }
        Err(TesseraError::out_of_memory(size))
    }

    /// Return `size` bytes at `view` to the allocator.
    ///
    /// Slots already free are skipped (double free is a no-op); a view outside
    /// every managed region is rejected. A null view is a no-op.
    pub fn deallocate(&self, view: BufferView, size: usize) -> Result<()> {
        if !view.is_valid() {
            return Ok(());
        }
        let mut state = self.inner.lock().unwrap();
        state.deallocate(view, size)
    }

    /// Total usable bytes across all regions
    pub fn total_bytes(&self) -> usize {
        let state = self.inner.lock().unwrap();
        state.regions.iter().map(|entry| entry.usable).sum()
    }

    /// Bytes currently free (reachable through Free slots)
    pub fn free_bytes(&self) -> usize {
        let state = self.inner.lock().unwrap();
        (0..state.layers[0].slots.len())
            .map(|idx| state.free_bytes_under(0, idx))
            .sum()
    }

    /// Check that free, in-use, and split slots tile every region exactly.
    ///
    /// Intended for tests and debugging sweeps; the allocator maintains this
    /// invariant across every operation.
    pub fn verify_integrity(&self) -> Result<()> {
        let state = self.inner.lock().unwrap();
        state.verify_integrity()
    }

    /// The configured level sizes, coarsest first
    pub fn levels(&self) -> Vec<usize> {
        self.inner.lock().unwrap().levels.clone()
    }
}

fn scan_order(lo: usize, hi: usize, dir: Direction) -> Vec<usize> {
    match dir {
        Direction::Forward => (lo..hi).collect(),
        Direction::Backward => (lo..hi).rev().collect(),
    }
}

impl<O: HeapOps> AllocatorState<O> {
    fn fan(&self, layer: usize) -> usize {
        self.levels[layer] / self.levels[layer + 1]
    }

    fn add_region(&mut self, bytes: usize) -> Result<u32> {
        let level0 = self.levels[0];
        let rounded = bytes.div_ceil(level0) * level0;
        let region = self.ops.allocate_region(rounded)?;
        let base = region.addr();
        let region_id = self.regions.len() as u32;
        let slot_count = rounded / level0;
        for i in 0..slot_count {
            self.layers[0].slots.push(SlotCell {
                state: SlotState::Free,
                addr: base + i * level0,
                child_begin: NO_CHILD,
                parent: NO_PARENT,
                region: region_id,
            });
        }
        self.regions.push(RegionEntry {
            region,
            usable: rounded,
        });
        Ok(region_id)
    }

    /// Greedy coarse-to-fine decomposition; a remainder rounds the finest
    /// level up by one slot.
    fn decompose(&self, size: usize) -> Vec<u32> {
        let mut rs = vec![0u32; self.levels.len()];
        let mut remainder = size;
        for (i, &level) in self.levels.iter().enumerate() {
            rs[i] = (remainder / level) as u32;
            remainder %= level;
        }
        if remainder > 0 {
            *rs.last_mut().expect("levels are non-empty") += 1;
        }
        rs
    }

    fn expand_for(&mut self, rs: &[u32]) -> Result<()> {
        let total: usize = rs
            .iter()
            .zip(self.levels.iter())
            .map(|(&count, &level)| count as usize * level)
            .sum();
        self.add_region(total)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Plan the span position for one decomposition, scanning level 0 in the
    /// given direction. Returns one position per level up to the deepest
    /// non-zero request, or None when nothing fits.
    fn find_plan(&self, rs: &[u32], dir: Direction) -> Option<Vec<LayerPos>> {
        let level0 = &self.layers[0];
        let slot_count = level0.slots.len();
        if slot_count == 0 {
            return None;
        }
        let need = rs[0] as usize;
        let deeper = rs[1..].iter().any(|&count| count > 0);

        if need == 0 {
            if !deeper {
                return None;
            }
            for idx in scan_order(0, slot_count, dir) {
                if let Some(suffix) = self.entry_suffix(rs, 1, idx, dir) {
                    let mut plan = vec![LayerPos::Existing(idx as u32)];
                    plan.extend(suffix);
                    return Some(plan);
                }
            }
            return None;
        }

        if slot_count < need {
            return None;
        }
        for start in scan_order(0, slot_count - need + 1, dir) {
            if !self.level0_run_is_free(start, need) {
                continue;
            }
            if deeper {
                let boundary = start + need;
                if boundary >= slot_count {
                    continue;
                }
                let last = &level0.slots[start + need - 1];
                let boundary_cell = &level0.slots[boundary];
                if boundary_cell.region != last.region
                    || boundary_cell.addr != last.addr + level0.slot_size
                {
                    continue;
                }
                if let Some(suffix) = self.boundary_suffix(rs, 1, Some(boundary)) {
                    let mut plan = vec![LayerPos::Existing(start as u32)];
                    plan.extend(suffix);
                    return Some(plan);
                }
            } else {
                return Some(vec![LayerPos::Existing(start as u32)]);
            }
        }
        None
    }

    /// A level-0 run must be free and byte-contiguous within one region.
    fn level0_run_is_free(&self, start: usize, need: usize) -> bool {
        let level0 = &self.layers[0];
        if level0.slots[start].state != SlotState::Free {
            return false;
        }
        for k in 1..need {
            let prev = &level0.slots[start + k - 1];
            let cell = &level0.slots[start + k];
            if cell.state != SlotState::Free
                || cell.region != prev.region
                || cell.addr != prev.addr + level0.slot_size
            {
                return false;
            }
        }
        true
    }

    /// Positions for the entry portion of a plan: nothing precedes these
    /// bytes, so any free run inside the parent works.
    fn entry_suffix(
        &self,
        rs: &[u32],
        child_layer: usize,
        parent_idx: usize,
        dir: Direction,
    ) -> Option<Vec<LayerPos>> {
        let need = rs[child_layer] as usize;
        let fan = self.fan(child_layer - 1);
        let deeper = rs[child_layer + 1..].iter().any(|&count| count > 0);
        if need > fan || (deeper && need >= fan) {
            return None;
        }

        let parent = &self.layers[child_layer - 1].slots[parent_idx];
        match parent.state {
            SlotState::InUse => None,
            SlotState::Free => {
                // Whole subtree is free: take the first children after split.
                let mut plan = vec![LayerPos::FirstChild];
                if deeper {
                    plan.extend(self.boundary_suffix(rs, child_layer + 1, None)?);
                }
                Some(plan)
            }
            SlotState::Split => {
                let child_begin = parent.child_begin as usize;
                let children = &self.layers[child_layer].slots;
                if need == 0 {
                    // Descend without acquiring anything at this level.
                    for child in scan_order(child_begin, child_begin + fan, dir) {
                        if let Some(suffix) = self.entry_suffix(rs, child_layer + 1, child, dir) {
                            let mut plan = vec![LayerPos::Existing(child as u32)];
                            plan.extend(suffix);
                            return Some(plan);
                        }
                    }
                    return None;
                }
                for start in scan_order(child_begin, child_begin + fan - need + 1, dir) {
                    let run_free =
                        (0..need).all(|k| children[start + k].state == SlotState::Free);
                    if !run_free {
                        continue;
                    }
                    if deeper {
                        let boundary = start + need;
                        if boundary >= child_begin + fan {
                            continue;
                        }
                        if let Some(suffix) =
                            self.boundary_suffix(rs, child_layer + 1, Some(boundary))
                        {
                            let mut plan = vec![LayerPos::Existing(start as u32)];
                            plan.extend(suffix);
                            return Some(plan);
                        }
                    } else {
                        return Some(vec![LayerPos::Existing(start as u32)]);
                    }
                }
                None
            }
        }
    }

    /// Positions for a boundary continuation: the bytes flow straight out of
    /// the preceding run, so the acquired children must be the first ones.
    /// `parent_idx` is None inside an all-free (not yet split) subtree.
    fn boundary_suffix(
        &self,
        rs: &[u32],
        child_layer: usize,
        parent_idx: Option<usize>,
    ) -> Option<Vec<LayerPos>> {
        let need = rs[child_layer] as usize;
        let fan = self.fan(child_layer - 1);
        let deeper = rs[child_layer + 1..].iter().any(|&count| count > 0);
        if need > fan || (deeper && need >= fan) {
            return None;
        }

        let virtual_subtree = match parent_idx {
            None => true,
            Some(idx) => {
                let parent = &self.layers[child_layer - 1].slots[idx];
                match parent.state {
                    SlotState::InUse => return None,
                    SlotState::Free => true,
                    SlotState::Split => false,
                }
            }
        };

        if virtual_subtree {
            let mut plan = vec![LayerPos::FirstChild];
            if deeper {
                plan.extend(self.boundary_suffix(rs, child_layer + 1, None)?);
            }
            return Some(plan);
        }

        let parent = &self.layers[child_layer - 1].slots[parent_idx.unwrap()];
        let child_begin = parent.child_begin as usize;
        let children = &self.layers[child_layer].slots;
        for k in 0..need {
            if children[child_begin + k].state != SlotState::Free {
                return None;
            }
        }
        let mut plan = vec![LayerPos::Existing(child_begin as u32)];
        if deeper {
            plan.extend(self.boundary_suffix(rs, child_layer + 1, Some(child_begin + need))?);
        }
        Some(plan)
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Ensure a slot is split; creates its children on first descent.
    fn split(&mut self, layer: usize, slot_idx: usize) -> usize {
        let fan = self.fan(layer);
        let (addr, child_begin, region) = {
            let cell = &self.layers[layer].slots[slot_idx];
            debug_assert_ne!(cell.state, SlotState::InUse, "cannot split an in-use slot");
            (cell.addr, cell.child_begin, cell.region)
        };
        let child_begin = if child_begin == NO_CHILD {
            let child_layer = &mut self.layers[layer + 1];
            let begin = child_layer.slots.len();
            let child_size = child_layer.slot_size;
            for k in 0..fan {
                child_layer.slots.push(SlotCell {
                    state: SlotState::Free,
                    addr: addr + k * child_size,
                    child_begin: NO_CHILD,
                    parent: slot_idx as u32,
                    region,
                });
            }
            self.layers[layer].slots[slot_idx].child_begin = begin as u32;
            begin
        } else {
            child_begin as usize
        };
        self.layers[layer].slots[slot_idx].state = SlotState::Split;
        child_begin
    }

    fn execute(&mut self, plan: &[LayerPos], rs: &[u32], size: usize) -> BufferView {
        let last_nonzero = rs
            .iter()
            .rposition(|&count| count > 0)
            .expect("non-zero request");
        let first = match plan[0] {
            LayerPos::Existing(idx) => idx as usize,
            LayerPos::FirstChild => unreachable!("level 0 position is always concrete"),
        };

        let mut base_addr = None;
        let mut boundary = first;
        if rs[0] > 0 {
            base_addr = Some(self.layers[0].slots[first].addr);
            for k in 0..rs[0] as usize {
                self.layers[0].slots[first + k].state = SlotState::InUse;
            }
            boundary = first + rs[0] as usize;
        }

        for layer in 1..=last_nonzero {
            let child_begin = self.split(layer - 1, boundary);
            let start = match plan[layer] {
                LayerPos::Existing(idx) => idx as usize,
                LayerPos::FirstChild => child_begin,
            };
            if rs[layer] > 0 {
                if base_addr.is_none() {
                    base_addr = Some(self.layers[layer].slots[start].addr);
                }
                for k in 0..rs[layer] as usize {
                    self.layers[layer].slots[start + k].state = SlotState::InUse;
                }
            }
            boundary = start + rs[layer] as usize;
        }

        BufferView::new(base_addr.expect("plan covers at least one slot"), 0, size)
    }

    // ------------------------------------------------------------------
    // Deallocation
    // ------------------------------------------------------------------

    fn deallocate(&mut self, view: BufferView, size: usize) -> Result<()> {
        let start = view.data();
        let contained = self
            .regions
            .iter()
            .any(|entry| start >= entry.region.addr() && start + size <= entry.region.addr() + entry.usable);
        if !contained {
            return Err(TesseraError::invalid_argument(
                "view",
                "address is outside every managed region",
            ));
        }

        let rs = self.decompose(size);
        let mut expected = start;
        for (layer_idx, &count) in rs.iter().enumerate() {
            let slot_size = self.layers[layer_idx].slot_size;
            for _ in 0..count {
                let found = self.layers[layer_idx]
                    .slots
                    .iter()
                    .position(|cell| cell.addr == expected && cell.state == SlotState::InUse);
                if let Some(idx) = found {
                    self.layers[layer_idx].slots[idx].state = SlotState::Free;
                    self.merge_upward(layer_idx, idx);
                }
                expected += slot_size;
            }
        }
        Ok(())
    }

    /// When every sibling of a just-freed slot is free, fold them back into
    /// the parent, recursively.
    fn merge_upward(&mut self, layer: usize, slot_idx: usize) {
        if layer == 0 {
            return;
        }
        let parent_idx = self.layers[layer].slots[slot_idx].parent as usize;
        let parent = self.layers[layer - 1].slots[parent_idx];
        if parent.state != SlotState::Split {
            return;
        }
        let fan = self.fan(layer - 1);
        let child_begin = parent.child_begin as usize;
        let all_free = (0..fan)
            .all(|k| self.layers[layer].slots[child_begin + k].state == SlotState::Free);
        if all_free {
            self.layers[layer - 1].slots[parent_idx].state = SlotState::Free;
            self.merge_upward(layer - 1, parent_idx);
        }
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    fn free_bytes_under(&self, layer: usize, slot_idx: usize) -> usize {
        let cell = &self.layers[layer].slots[slot_idx];
        match cell.state {
            SlotState::Free => self.layers[layer].slot_size,
            SlotState::InUse => 0,
            SlotState::Split => {
                let fan = self.fan(layer);
                let child_begin = cell.child_begin as usize;
                (child_begin..child_begin + fan)
                    .map(|child| self.free_bytes_under(layer + 1, child))
                    .sum()
            }
        }
    }

    fn verify_integrity(&self) -> Result<()> {
        // Split slots must have children that exactly tile them; live slots
        // below level 0 must sit under a Split parent.
        for layer_idx in 0..self.layers.len() {
            let layer = &self.layers[layer_idx];
            for (slot_idx, cell) in layer.slots.iter().enumerate() {
                if cell.state == SlotState::Split {
                    if layer_idx + 1 >= self.layers.len() || cell.child_begin == NO_CHILD {
                        return Err(TesseraError::invalid_state(format!(
                            "split slot {} at level {} has no children",
                            slot_idx, layer_idx
                        )));
                    }
                    let fan = self.fan(layer_idx);
                    let child_size = self.layers[layer_idx + 1].slot_size;
                    let child_begin = cell.child_begin as usize;
                    for k in 0..fan {
                        let child = &self.layers[layer_idx + 1].slots[child_begin + k];
                        if child.parent as usize != slot_idx
                            || child.addr != cell.addr + k * child_size
                        {
                            return Err(TesseraError::invalid_state(format!(
                                "child {} of slot {} at level {} does not tile its parent",
                                k, slot_idx, layer_idx
                            )));
                        }
                    }
                }
                if layer_idx > 0 && cell.state != SlotState::Free {
                    let parent = &self.layers[layer_idx - 1].slots[cell.parent as usize];
                    if parent.state != SlotState::Split {
                        return Err(TesseraError::invalid_state(format!(
                            "live slot {} at level {} has a non-split parent",
                            slot_idx, layer_idx
                        )));
                    }
                }
            }
        }

        // Level-0 slots must tile each region exactly.
        for (region_id, entry) in self.regions.iter().enumerate() {
            let mut addrs: Vec<usize> = self.layers[0]
                .slots
                .iter()
                .filter(|cell| cell.region as usize == region_id)
                .map(|cell| cell.addr)
                .collect();
            addrs.sort_unstable();
            let level0 = self.levels[0];
            if addrs.len() * level0 != entry.usable {
                return Err(TesseraError::invalid_state(format!(
                    "region {} is not fully tiled by level-0 slots",
                    region_id
                )));
            }
            for (i, &addr) in addrs.iter().enumerate() {
                if addr != entry.region.addr() + i * level0 {
                    return Err(TesseraError::invalid_state(format!(
                        "region {} has a gap or overlap at slot {}",
                        region_id, i
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeRegion {
        addr: usize,
        size: usize,
    }

    impl HeapRegion for FakeRegion {
        fn addr(&self) -> usize {
            self.addr
        }

        fn size(&self) -> usize {
            self.size
        }
    }

    /// Hands out disjoint fake address ranges starting at 0x10000.
    struct FakeHeapOps {
        next: AtomicUsize,
    }

    impl FakeHeapOps {
        fn new() -> Self {
            Self {
                next: AtomicUsize::new(0x10000),
            }
        }
    }

    impl HeapOps for FakeHeapOps {
        type Region = FakeRegion;

        fn allocate_region(&self, size: usize) -> crate::error::Result<FakeRegion> {
            let addr = self.next.fetch_add(size + 0x1000, Ordering::SeqCst);
            Ok(FakeRegion { addr, size })
        }
    }

    fn allocator(levels: Vec<usize>) -> HierarchicalSlotAllocator<FakeHeapOps> {
        HierarchicalSlotAllocator::new(FakeHeapOps::new(), levels).unwrap()
    }

    #[test]
    fn test_level_validation() {
        assert!(HierarchicalSlotAllocator::new(FakeHeapOps::new(), vec![]).is_err());
        assert!(HierarchicalSlotAllocator::new(FakeHeapOps::new(), vec![0]).is_err());
        assert!(HierarchicalSlotAllocator::new(FakeHeapOps::new(), vec![128, 256]).is_err());
        assert!(HierarchicalSlotAllocator::new(FakeHeapOps::new(), vec![256, 96]).is_err());
        assert!(HierarchicalSlotAllocator::new(FakeHeapOps::new(), vec![256, 128, 32]).is_ok());
    }

    #[test]
    fn test_decompose_rounds_last_level_up() {
        let alloc = allocator(vec![256, 128]);
        let state = alloc.inner.lock().unwrap();
        assert_eq!(state.decompose(256), vec![1, 0]);
        assert_eq!(state.decompose(128), vec![0, 1]);
        assert_eq!(state.decompose(384), vec![1, 1]);
        assert_eq!(state.decompose(100), vec![0, 1]);
        assert_eq!(state.decompose(300), vec![1, 1]);
    }

    #[test]
    fn test_single_level_allocate_free() {
        let alloc = allocator(vec![256]);
        alloc.add_region(512).unwrap();
        assert_eq!(alloc.total_bytes(), 512);
        assert_eq!(alloc.free_bytes(), 512);

        let a = alloc.allocate(256).unwrap();
        let b = alloc.allocate(256).unwrap();
        assert_ne!(a.data(), b.data());
        assert_eq!(alloc.free_bytes(), 0);
        alloc.verify_integrity().unwrap();

        alloc.deallocate(a, 256).unwrap();
        assert_eq!(alloc.free_bytes(), 256);
        alloc.deallocate(b, 256).unwrap();
        assert_eq!(alloc.free_bytes(), 512);
        alloc.verify_integrity().unwrap();
    }

    #[test]
    fn test_tail_search_prefers_tail() {
        let alloc = allocator(vec![128]);
        alloc.add_region(512).unwrap();
        let first = alloc.allocate(128).unwrap();
        let second = alloc.allocate(128).unwrap();
        // Backward scan: later allocations sit at lower addresses.
        assert!(second.data() < first.data());
    }

    #[test]
    fn test_split_and_merge() {
        let alloc = allocator(vec![256, 128]);
        alloc.add_region(256).unwrap();

        // First 128: the only level-0 slot splits and the first child is used.
        let a = alloc.allocate(128).unwrap();
        assert_eq!(alloc.free_bytes(), 128);
        alloc.verify_integrity().unwrap();

        // Second 128 takes the remaining child.
        let b = alloc.allocate(128).unwrap();
        assert_eq!(alloc.free_bytes(), 0);
        assert_eq!(b.data(), a.data() + 128);

        // Free the first child: parent still split.
        alloc.deallocate(a, 128).unwrap();
        assert_eq!(alloc.free_bytes(), 128);
        alloc.verify_integrity().unwrap();

        // Free the second: all children free, parent merges back to Free.
        alloc.deallocate(b, 128).unwrap();
        assert_eq!(alloc.free_bytes(), 256);
        alloc.verify_integrity().unwrap();

        // The merged slot is whole again.
        let c = alloc.allocate(256).unwrap();
        assert_eq!(c.data(), a.data());
    }

    #[test]
    fn test_expand_and_retry() {
        let alloc = allocator(vec![256]);
        alloc.add_region(256).unwrap();
        let first = alloc.allocate(256).unwrap();

        // Pool is fully in use: the request forces a new region.
        let second = alloc.allocate(256).unwrap();
        assert_ne!(first.data(), second.data());
        assert_eq!(alloc.total_bytes(), 512);
        alloc.verify_integrity().unwrap();
    }

    #[test]
    fn test_multi_level_span() {
        let alloc = allocator(vec![256, 64]);
        alloc.add_region(512).unwrap();

        // 320 = one 256 slot + one 64-byte child of the boundary slot.
        let view = alloc.allocate(320).unwrap();
        assert_eq!(view.size(), 320);
        alloc.verify_integrity().unwrap();
        assert_eq!(alloc.free_bytes(), 512 - 256 - 64);

        alloc.deallocate(view, 320).unwrap();
        assert_eq!(alloc.free_bytes(), 512);
        alloc.verify_integrity().unwrap();
    }

    #[test]
    fn test_double_free_is_noop() {
        let alloc = allocator(vec![256]);
        alloc.add_region(256).unwrap();
        let view = alloc.allocate(256).unwrap();
        alloc.deallocate(view, 256).unwrap();
        alloc.deallocate(view, 256).unwrap();
        assert_eq!(alloc.free_bytes(), 256);
        alloc.verify_integrity().unwrap();
    }

    #[test]
    fn test_foreign_view_rejected() {
        let alloc = allocator(vec![256]);
        alloc.add_region(256).unwrap();
        let foreign = BufferView::new(0xDEAD_0000, 0, 256);
        let err = alloc.deallocate(foreign, 256).unwrap_err();
        assert!(matches!(err, TesseraError::InvalidArgument { .. }));

        // Null views are silently ignored.
        alloc.deallocate(BufferView::null(), 256).unwrap();
    }

    #[test]
    fn test_zero_size_rejected() {
        let alloc = allocator(vec![256]);
        alloc.add_region(256).unwrap();
        assert!(alloc.allocate(0).is_err());
    }

    #[test]
    fn test_three_level_descent() {
        let alloc = allocator(vec![256, 128, 32]);
        alloc.add_region(256).unwrap();

        // 32 bytes descends two levels, splitting both.
        let a = alloc.allocate(32).unwrap();
        alloc.verify_integrity().unwrap();
        assert_eq!(alloc.free_bytes(), 256 - 32);

        // 160 = 128 + 32: needs a contiguous level-1 slot plus the first child
        // of the following slot. The fragmented region cannot provide that, so
        // the allocator expands.
        let b = alloc.allocate(160).unwrap();
        alloc.verify_integrity().unwrap();
        assert_ne!(a.data(), b.data());
        assert_eq!(alloc.total_bytes(), 512);

        alloc.deallocate(b, 160).unwrap();
        alloc.deallocate(a, 32).unwrap();
        assert_eq!(alloc.free_bytes(), 512);
        alloc.verify_integrity().unwrap();

        // Everything merged back: a whole 256 fits again.
        alloc.allocate(256).unwrap();
    }
}
