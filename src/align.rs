/// Rounds a byte count up to the next multiple of the machine word.
///
/// Heap growth requests go through this so that every block header lands on
/// a word boundary, while the block itself keeps the unrounded size the
/// caller asked for.
///
/// # Examples
///
/// ```rust
/// use rcollector::align;
///
/// match std::mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    ($value + ::core::mem::size_of::<usize>() - 1) & !(::core::mem::size_of::<usize>() - 1)
  };
}

/// Checked form of [`align!`]: `None` when rounding up would overflow.
pub const fn checked_align(value: usize) -> Option<usize> {
  let mask = core::mem::size_of::<usize>() - 1;
  match value.checked_add(mask) {
    Some(padded) => Some(padded & !mask),
    None => None,
  }
}

/// Number of unaligned word-sized candidates a region of `len` bytes yields
/// when read at every byte offset.
pub const fn candidate_count(len: usize) -> usize {
  let word = core::mem::size_of::<usize>();
  if len < word { 0 } else { len - word + 1 }
}

#[cfg(test)]
mod tests {
  use std::mem;

  use super::{candidate_count, checked_align};

  #[test]
  fn rounds_up_to_word() {
    let word = mem::size_of::<usize>();

    for i in 0..10 {
      for size in (word * i + 1)..=(word * (i + 1)) {
        assert_eq!(word * (i + 1), align!(size));
      }
    }
  }

  #[test]
  fn header_plus_payload_stays_aligned() {
    let word = mem::size_of::<usize>();
    assert_eq!(align!(3 * word + 1) % word, 0);
    assert_eq!(align!(0), 0);
  }

  #[test]
  fn checked_rounding_matches_macro_and_catches_overflow() {
    for size in 0..64 {
      assert_eq!(checked_align(size), Some(align!(size)));
    }
    assert_eq!(checked_align(usize::MAX), None);
    assert_eq!(checked_align(usize::MAX - 2), None);
  }

  #[test]
  fn counts_byte_offsets_that_fit_a_word() {
    let word = mem::size_of::<usize>();
    assert_eq!(candidate_count(0), 0);
    assert_eq!(candidate_count(word - 1), 0);
    assert_eq!(candidate_count(word), 1);
    assert_eq!(candidate_count(word + 5), 6);
  }
}
