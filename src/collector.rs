//! Conservative mark and sweep over the block ledger.
//!
//! A collection reads every word-sized value found at every byte offset of
//! three sources, in order:
//!
//! 1. the static segment,
//! 2. the stack between the collecting frame and the recorded bottom,
//! 3. the payload of every block in the ledger, reachable or not.
//!
//! Any value that lands inside a block's payload marks that block. The heap
//! pass is a single sweep over all blocks rather than a traversal from the
//! roots, so a block stays alive as long as any block at all, freed ones
//! included, still holds a matching byte pattern.

use std::{ptr, ptr::NonNull, time::Instant};

use tracing::{debug, info};

use crate::{
  align::candidate_count,
  allocator::{BlockAllocator, Blocks},
  block::{Block, BlockInfo},
  error::{GcError, Result},
  heap::HeapGrowth,
  range::AddressRange,
  roots::{StackBounds, StaticSegment, frame_address},
};

/// Outcome of one [`Collector::collect`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectStats {
  /// Blocks in the ledger.
  pub blocks: usize,
  /// Blocks found reachable.
  pub marked: usize,
  /// Blocks that went from in use to freed.
  pub reclaimed_blocks: usize,
  pub reclaimed_bytes: usize,
  /// `memory_in_use()` after the sweep.
  pub in_use: usize,
}

/// Allocator plus the root sources a collection scans.
pub struct Collector<H: HeapGrowth, S: StaticSegment, K: StackBounds> {
  allocator: BlockAllocator<H>,
  statics: S,
  stack: K,
}

/// Candidate targets for one mark phase.
struct Targets {
  blocks: Vec<(AddressRange, NonNull<Block>)>,
  envelope: AddressRange,
}

impl Targets {
  fn snapshot(blocks: Blocks<'_>) -> Self {
    let blocks: Vec<_> = blocks
      .map(|block| (unsafe { Block::payload_range(block.as_ptr()) }, block))
      .collect();
    let envelope = blocks
      .iter()
      .fold(AddressRange::EMPTY, |envelope, (range, _)| envelope.union(range));

    Self { blocks, envelope }
  }

  /// Marks every block some candidate in `region` points into. Returns how
  /// many blocks were newly marked.
  ///
  /// # Safety
  ///
  /// All of `region` must be readable.
  unsafe fn mark_region(
    &self,
    region: AddressRange,
  ) -> usize {
    let mut newly_marked = 0;

    for offset in 0..candidate_count(region.len()) {
      let candidate = unsafe { ptr::read_unaligned((region.start + offset) as *const usize) };

      if !self.envelope.contains(candidate) {
        continue;
      }

      for (payload, block) in &self.blocks {
        if payload.contains(candidate) {
          let block = unsafe { &mut *block.as_ptr() };
          if !block.active {
            block.active = true;
            newly_marked += 1;
          }
        }
      }
    }

    newly_marked
  }
}

impl<H: HeapGrowth, S: StaticSegment, K: StackBounds> Collector<H, S, K> {
  pub fn new(
    heap: H,
    statics: S,
    stack: K,
  ) -> Self {
    Self {
      allocator: BlockAllocator::new(heap),
      statics,
      stack,
    }
  }

  /// Hands out `size` bytes that the next collections reclaim once nothing
  /// points into them. `None` for a zero size or an exhausted heap.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    self.allocator.allocate(size)
  }

  /// Runs one mark phase and one sweep.
  ///
  /// Fails with [`GcError::NothingToCollect`] before the first successful
  /// allocation.
  #[inline(never)]
  pub fn collect(&mut self) -> Result<CollectStats> {
    // Taken before anything below touches a payload address, so only the
    // callers' frames and this one are scanned.
    let frame = frame_address();

    if self.allocator.is_empty() {
      return Err(GcError::NothingToCollect);
    }

    let started = Instant::now();
    let marked = self.mark(frame);
    let (reclaimed_blocks, reclaimed_bytes) = self.sweep();

    let stats = CollectStats {
      blocks: self.allocator.block_count(),
      marked,
      reclaimed_blocks,
      reclaimed_bytes,
      in_use: self.memory_in_use(),
    };

    info!(
      duration_us = started.elapsed().as_micros() as u64,
      blocks = stats.blocks,
      marked = stats.marked,
      reclaimed_bytes = stats.reclaimed_bytes,
      in_use = stats.in_use,
      "collection complete"
    );

    Ok(stats)
  }

  fn mark(
    &mut self,
    frame: usize,
  ) -> usize {
    let targets = Targets::snapshot(self.allocator.iter());

    let statics = self.statics.static_range();
    let from_statics = unsafe { targets.mark_region(statics) };
    debug!(region = ?statics, marked = from_statics, "scanned static segment");

    let stack = self.stack.stack_range(frame);
    let from_stack = unsafe { targets.mark_region(stack) };
    debug!(region = ?stack, marked = from_stack, "scanned stack");

    let mut from_heap = 0;
    for (payload, _) in &targets.blocks {
      from_heap += unsafe { targets.mark_region(*payload) };
    }
    debug!(blocks = targets.blocks.len(), marked = from_heap, "scanned heap blocks");

    from_statics + from_stack + from_heap
  }

  fn sweep(&mut self) -> (usize, usize) {
    let mut reclaimed_blocks = 0;
    let mut reclaimed_bytes = 0;

    for block in self.allocator.iter() {
      let block = unsafe { &mut *block.as_ptr() };

      if !block.active {
        if !block.freed {
          reclaimed_blocks += 1;
          reclaimed_bytes += block.size;
        }
        block.freed = true;
      }
      block.active = false;
    }

    debug!(reclaimed_blocks, reclaimed_bytes, "sweep complete");
    (reclaimed_blocks, reclaimed_bytes)
  }

  /// Sum of the sizes of all blocks not currently freed.
  pub fn memory_in_use(&self) -> usize {
    self.allocator.memory_in_use()
  }

  /// Sum of the sizes of all blocks ever created. Never decreases.
  pub fn heap_committed(&self) -> usize {
    self.allocator.heap_committed()
  }

  pub fn block_count(&self) -> usize {
    self.allocator.block_count()
  }

  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.allocator.blocks()
  }

  pub fn allocator(&self) -> &BlockAllocator<H> {
    &self.allocator
  }
}
