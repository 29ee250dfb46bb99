//! Raw heap growth: the only place memory enters the ledger from.

use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};
use tracing::{trace, warn};

use crate::{align, align::checked_align, range::AddressRange};

/// Extends a contiguous region and hands back the start of the new bytes.
pub trait HeapGrowth {
  /// Grows the region by `bytes`, or returns `None` when it cannot.
  ///
  /// Implementations must return word aligned memory that stays valid for
  /// the lifetime of the implementor.
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

/// Current program break, `sbrk(0)`.
pub fn program_break() -> *mut c_void {
  unsafe { sbrk(0) }
}

/// Moves the process data segment with `sbrk(2)`.
///
/// `sbrk` is process global and not thread safe, so a process should hold
/// at most one collector built on it.
#[derive(Debug, Default)]
pub struct Sbrk;

impl HeapGrowth for Sbrk {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = intptr_t::try_from(bytes).ok()?;
    let address = unsafe { sbrk(increment) };

    if address == usize::MAX as *mut c_void {
      warn!(bytes, "sbrk refused to grow the data segment");
      return None;
    }

    trace!(bytes, start = ?address, "program break moved");
    NonNull::new(address as *mut u8)
  }
}

/// Bump region inside a fixed, zero initialized word buffer.
///
/// Gives a collector a heap of its own that never touches the program
/// break, and fails deterministically once `capacity` bytes are used.
pub struct ArenaHeap {
  words: Box<[usize]>,
  used: usize,
}

impl ArenaHeap {
  pub fn with_capacity(bytes: usize) -> Self {
    let words = align!(bytes) / size_of::<usize>();
    Self {
      words: vec![0usize; words].into_boxed_slice(),
      used: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.words.len() * size_of::<usize>()
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.used
  }

  /// Addresses the arena can ever hand out.
  pub fn bounds(&self) -> AddressRange {
    AddressRange::of(&*self.words)
  }
}

impl HeapGrowth for ArenaHeap {
  fn grow(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let Some(bytes) = checked_align(bytes) else {
      trace!("arena request overflows");
      return None;
    };
    if bytes > self.remaining() {
      trace!(bytes, remaining = self.remaining(), "arena exhausted");
      return None;
    }

    let start = unsafe { (self.words.as_mut_ptr() as *mut u8).add(self.used) };
    self.used += bytes;
    NonNull::new(start)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align;

  #[test]
  fn arena_bumps_and_exhausts() {
    let mut arena = ArenaHeap::with_capacity(64);
    let bounds = arena.bounds();

    let first = arena.grow(10).unwrap().as_ptr() as usize;
    let second = arena.grow(8).unwrap().as_ptr() as usize;

    assert_eq!(first, bounds.start);
    assert_eq!(second, first + align!(10));
    assert_eq!(second % size_of::<usize>(), 0);
    assert_eq!(arena.remaining(), 64 - align!(10) - 8);

    assert!(arena.grow(64).is_none());
    assert!(arena.grow(arena.remaining()).is_some());
    assert_eq!(arena.remaining(), 0);
  }

  #[test]
  fn oversized_arena_request_yields_none() {
    let mut arena = ArenaHeap::with_capacity(64);

    assert!(arena.grow(usize::MAX).is_none());
    assert!(arena.grow(usize::MAX - 4).is_none());
    assert_eq!(arena.remaining(), 64);
  }

  #[test]
  fn arena_memory_starts_zeroed() {
    let mut arena = ArenaHeap::with_capacity(32);
    let start = arena.grow(32).unwrap().as_ptr();

    for offset in 0..32 {
      assert_eq!(unsafe { *start.add(offset) }, 0);
    }
  }
}
