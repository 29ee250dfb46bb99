use std::fmt;

/// Half-open interval of addresses, `[start, end)`.
///
/// Membership is plain integer comparison so the scanning logic never needs
/// to compare pointers directly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AddressRange {
  pub start: usize,
  pub end: usize,
}

impl AddressRange {
  /// An empty range; scanning it yields no candidates.
  pub const EMPTY: AddressRange = AddressRange { start: 0, end: 0 };

  /// Builds `[start, end)`. An inverted pair collapses to an empty range at `start`.
  pub const fn new(
    start: usize,
    end: usize,
  ) -> Self {
    if end < start {
      Self { start, end: start }
    } else {
      Self { start, end }
    }
  }

  pub const fn with_len(
    start: usize,
    len: usize,
  ) -> Self {
    Self::new(start, start.saturating_add(len))
  }

  /// Covers the memory of `value`.
  pub fn of<T: ?Sized>(value: &T) -> Self {
    Self::with_len(value as *const T as *const u8 as usize, size_of_val(value))
  }

  #[inline]
  pub const fn len(&self) -> usize {
    self.end - self.start
  }

  #[inline]
  pub const fn is_empty(&self) -> bool {
    self.end == self.start
  }

  #[inline]
  pub const fn contains(
    &self,
    candidate: usize,
  ) -> bool {
    candidate >= self.start && candidate < self.end
  }

  /// Whether the two ranges share at least one address.
  pub const fn overlaps(
    &self,
    other: &AddressRange,
  ) -> bool {
    !self.is_empty() && !other.is_empty() && self.start < other.end && other.start < self.end
  }

  /// Smallest range covering both. Empty ranges are ignored.
  pub const fn union(
    &self,
    other: &AddressRange,
  ) -> AddressRange {
    if self.is_empty() {
      return *other;
    }
    if other.is_empty() {
      return *self;
    }
    let start = if self.start < other.start { self.start } else { other.start };
    let end = if self.end > other.end { self.end } else { other.end };
    AddressRange { start, end }
  }
}

impl fmt::Debug for AddressRange {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:#x}..{:#x}", self.start, self.end)
  }
}
