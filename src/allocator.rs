use std::{marker::PhantomData, ptr, ptr::NonNull};

use tracing::trace;

use crate::{
  align::checked_align,
  block::{Block, BlockInfo},
  heap::HeapGrowth,
};

/// First-fit allocator over an append-only ledger of blocks.
///
/// Blocks are never split, merged, moved or returned to the heap; freeing
/// one only flips its `freed` flag so a later request can reuse it.
pub struct BlockAllocator<H: HeapGrowth> {
  heap: H,
  first: *mut Block,
  last: *mut Block,
  count: usize,
}

impl<H: HeapGrowth> BlockAllocator<H> {
  pub fn new(heap: H) -> Self {
    Self {
      heap,
      first: ptr::null_mut(),
      last: ptr::null_mut(),
      count: 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.first.is_null()
  }

  pub fn block_count(&self) -> usize {
    self.count
  }

  fn find_free_block(
    &self,
    size: usize,
  ) -> *mut Block {
    for block in self.iter() {
      let block = block.as_ptr();
      unsafe {
        if (*block).freed && (*block).size >= size {
          return block;
        }
      }
    }

    ptr::null_mut()
  }

  /// Returns a payload of at least `size` bytes, or `None` for a zero size
  /// or when the heap cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<NonNull<u8>> {
    if size == 0 {
      return None;
    }

    let free_block = self.find_free_block(size);

    if !free_block.is_null() {
      unsafe {
        (*free_block).freed = false;
        let payload = Block::payload(free_block);
        trace!(size, capacity = (*free_block).size, address = ?payload, "reused freed block");
        return NonNull::new(payload);
      }
    }

    let Some(total_size) = Block::HEADER_SIZE.checked_add(size).and_then(checked_align) else {
      trace!(size, "request too large for any heap");
      return None;
    };
    let address = self.heap.grow(total_size)?;

    unsafe {
      let block = address.as_ptr() as *mut Block;
      block.write(Block::new(size));

      if self.first.is_null() {
        self.first = block;
      } else {
        (*self.last).next = block;
      }
      self.last = block;
      self.count += 1;

      let payload = Block::payload(block);
      trace!(size, grown = total_size, address = ?payload, "grew heap for new block");
      NonNull::new(payload)
    }
  }

  /// Walks the ledger in insertion order.
  pub fn iter(&self) -> Blocks<'_> {
    Blocks {
      current: self.first,
      _ledger: PhantomData,
    }
  }

  /// Bytes handed out and not yet reclaimed.
  pub fn memory_in_use(&self) -> usize {
    self
      .iter()
      .map(|block| unsafe { block.as_ref() })
      .filter(|block| !block.freed)
      .map(|block| block.size)
      .sum()
  }

  /// Bytes held by every block ever created, freed or not.
  pub fn heap_committed(&self) -> usize {
    self.iter().map(|block| unsafe { block.as_ref().size }).sum()
  }

  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.iter().map(|block| unsafe {
      BlockInfo {
        payload: Block::payload_range(block.as_ptr()),
        freed: block.as_ref().freed,
      }
    })
  }
}

/// Iterator over the headers in a ledger.
pub struct Blocks<'a> {
  current: *mut Block,
  _ledger: PhantomData<&'a Block>,
}

impl Iterator for Blocks<'_> {
  type Item = NonNull<Block>;

  fn next(&mut self) -> Option<Self::Item> {
    let block = NonNull::new(self.current)?;
    self.current = unsafe { block.as_ref().next };
    Some(block)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::heap::{ArenaHeap, Sbrk};

  fn allocator() -> BlockAllocator<ArenaHeap> {
    BlockAllocator::new(ArenaHeap::with_capacity(4096))
  }

  fn free_all(allocator: &mut BlockAllocator<ArenaHeap>) {
    for block in allocator.iter() {
      unsafe { (*block.as_ptr()).freed = true };
    }
  }

  #[test]
  fn zero_size_is_refused() {
    let mut allocator = allocator();

    assert!(allocator.allocate(0).is_none());
    assert!(allocator.is_empty());
  }

  #[test]
  fn blocks_are_appended_in_order() {
    let mut allocator = allocator();

    let first = allocator.allocate(8).unwrap();
    let second = allocator.allocate(5).unwrap();
    let third = allocator.allocate(16).unwrap();

    let payloads: Vec<usize> = allocator.blocks().map(|info| info.payload.start).collect();
    assert_eq!(
      payloads,
      vec![first.as_ptr() as usize, second.as_ptr() as usize, third.as_ptr() as usize]
    );
    assert_eq!(allocator.block_count(), 3);
    assert_eq!(allocator.memory_in_use(), 29);
    assert_eq!(allocator.heap_committed(), 29);
  }

  #[test]
  fn payloads_do_not_overlap_and_are_usable() {
    let mut allocator = allocator();

    let a = allocator.allocate(3).unwrap().as_ptr();
    let b = allocator.allocate(12).unwrap().as_ptr();

    unsafe {
      ptr::write_bytes(a, 0xAA, 3);
      ptr::write_bytes(b, 0xBB, 12);

      assert_eq!(*a.add(2), 0xAA);
      assert_eq!(*b, 0xBB);
    }

    let infos: Vec<BlockInfo> = allocator.blocks().collect();
    assert!(!infos[0].payload.overlaps(&infos[1].payload));
    assert_eq!(b as usize % size_of::<usize>(), 0);
  }

  #[test]
  fn first_fit_reuses_earliest_adequate_block() {
    let mut allocator = allocator();

    let small = allocator.allocate(4).unwrap();
    let large = allocator.allocate(64).unwrap();
    let medium = allocator.allocate(32).unwrap();
    free_all(&mut allocator);

    // The 64 byte block comes first in the ledger, so it wins over the tighter 32.
    let reused = allocator.allocate(20).unwrap();
    assert_eq!(reused, large);
    assert_ne!(reused, medium);

    let tiny = allocator.allocate(1).unwrap();
    assert_eq!(tiny, small);

    assert_eq!(allocator.block_count(), 3);
    // Wasted capacity is still accounted at the block's own size.
    assert_eq!(allocator.memory_in_use(), 64 + 4);
  }

  #[test]
  fn reused_block_is_not_handed_out_twice() {
    let mut allocator = allocator();

    allocator.allocate(16).unwrap();
    free_all(&mut allocator);

    let first = allocator.allocate(16).unwrap();
    let second = allocator.allocate(16).unwrap();

    assert_ne!(first, second);
    assert_eq!(allocator.block_count(), 2);
  }

  #[test]
  fn too_small_freed_blocks_force_growth() {
    let mut allocator = allocator();

    allocator.allocate(8).unwrap();
    free_all(&mut allocator);

    allocator.allocate(9).unwrap();
    assert_eq!(allocator.block_count(), 2);
    assert_eq!(allocator.memory_in_use(), 9);
    assert_eq!(allocator.heap_committed(), 17);
  }

  #[test]
  fn exhausted_heap_yields_none() {
    let mut allocator = BlockAllocator::new(ArenaHeap::with_capacity(Block::HEADER_SIZE + 8));

    assert!(allocator.allocate(8).is_some());
    assert!(allocator.allocate(1).is_none());
    assert_eq!(allocator.block_count(), 1);
  }

  #[test]
  fn oversized_request_yields_none() {
    let mut arena = allocator();
    arena.allocate(8).unwrap();

    assert!(arena.allocate(usize::MAX).is_none());
    assert!(arena.allocate(usize::MAX - Block::HEADER_SIZE).is_none());
    assert!(arena.allocate(usize::MAX - Block::HEADER_SIZE - 4).is_none());
    assert_eq!(arena.block_count(), 1);

    // Later blocks still get their own, non-overlapping payloads.
    arena.allocate(8).unwrap();
    let infos: Vec<BlockInfo> = arena.blocks().collect();
    assert_eq!(infos.len(), 2);
    assert!(!infos[0].payload.overlaps(&infos[1].payload));

    // Refused before the program break is ever touched.
    let mut sbrk = BlockAllocator::new(Sbrk);
    assert!(sbrk.allocate(usize::MAX).is_none());
    assert!(sbrk.allocate(usize::MAX - Block::HEADER_SIZE - 4).is_none());
    assert!(sbrk.is_empty());
  }

  #[test]
  fn stale_contents_survive_reuse() {
    let mut allocator = allocator();

    let payload = allocator.allocate(8).unwrap().as_ptr();
    unsafe { payload.write(0x5A) };
    free_all(&mut allocator);

    let reused = allocator.allocate(8).unwrap().as_ptr();
    assert_eq!(reused, payload);
    assert_eq!(unsafe { *reused }, 0x5A);
  }
}
