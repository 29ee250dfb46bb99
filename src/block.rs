use std::mem;

use crate::range::AddressRange;

/// Header written immediately before every payload handed out.
///
/// ```text
///   ┌─────────────────────────┬──────────────────────────┐
///   │ Block                   │ payload (`size` bytes)   │
///   │  size, next,            │                          │
///   │  freed, active          │                          │
///   └─────────────────────────┴──────────────────────────┘
///   ▲                         ▲
///   header (private)          address returned to callers
/// ```
#[repr(C)]
pub struct Block {
  pub size: usize,
  pub next: *mut Block,
  pub freed: bool,
  /// Mark bit. Only meaningful between the mark and sweep of one collection.
  pub active: bool,
}

impl Block {
  pub const HEADER_SIZE: usize = mem::size_of::<Block>();

  pub fn new(size: usize) -> Self {
    Self {
      size,
      next: std::ptr::null_mut(),
      freed: false,
      active: false,
    }
  }

  /// Payload start for the header at `block`.
  ///
  /// # Safety
  ///
  /// `block` must point at a header followed by its payload.
  #[inline]
  pub unsafe fn payload(block: *mut Block) -> *mut u8 {
    unsafe { (block as *mut u8).add(Self::HEADER_SIZE) }
  }

  /// Address range of the payload belonging to the header at `block`.
  ///
  /// # Safety
  ///
  /// `block` must point at an initialized header.
  #[inline]
  pub unsafe fn payload_range(block: *mut Block) -> AddressRange {
    unsafe { AddressRange::with_len(Self::payload(block) as usize, (*block).size) }
  }
}

/// Read-only snapshot of a block, for inspection and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub payload: AddressRange,
  pub freed: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn header_is_word_multiple() {
    assert_eq!(Block::HEADER_SIZE % mem::size_of::<usize>(), 0);
  }

  #[test]
  fn payload_follows_header() {
    let mut storage = [0usize; 8];
    let block = storage.as_mut_ptr() as *mut Block;

    unsafe {
      block.write(Block::new(10));

      let payload = Block::payload(block);
      assert_eq!(payload as usize - block as usize, Block::HEADER_SIZE);

      let range = Block::payload_range(block);
      assert_eq!(range.start, payload as usize);
      assert_eq!(range.len(), 10);
      assert!(!(*block).freed);
      assert!(!(*block).active);
    }
  }
}
