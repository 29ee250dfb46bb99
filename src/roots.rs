//! Root regions: where the collector looks for candidate pointers besides
//! the heap itself.
//!
//! ```text
//!   High Address ┌─────────────────────┐ ← recorded stack bottom
//!                │       Stack         │   (scanned down to the frame
//!                │         ▼           │    of the collecting call)
//!                │                     │
//!                │         ▲           │
//!                │       Heap          │   blocks, scanned one by one
//!                ├─────────────────────┤
//!                │  .bss / .data       │   static segment
//!                ├─────────────────────┤
//!                │       Text          │
//!   Low Address  └─────────────────────┘
//! ```

use tracing::{debug, warn};

use crate::{config::StackBottom, range::AddressRange};

/// Default distance above the recording frame used by [`StackBottom::Heuristic`].
pub const HEURISTIC_STACK_OFFSET: usize = 256;

/// Locates the static data segment.
pub trait StaticSegment {
  fn static_range(&self) -> AddressRange;
}

/// `None` leaves the static segment out of the scan.
impl<T: StaticSegment> StaticSegment for Option<T> {
  fn static_range(&self) -> AddressRange {
    self.as_ref().map_or(AddressRange::EMPTY, StaticSegment::static_range)
  }
}

/// Brackets the live part of the stack.
pub trait StackBounds {
  /// Range to scan when the collecting call's frame sits at `frame`.
  fn stack_range(
    &self,
    frame: usize,
  ) -> AddressRange;
}

/// Address of a local in the caller's frame.
///
/// Always inlined so the address belongs to the frame that calls it, not to a
/// helper frame that is gone by the time the stack is scanned.
#[inline(always)]
pub fn frame_address() -> usize {
  let marker = 0usize;
  std::hint::black_box(&marker) as *const usize as usize
}

/// `.data` and `.bss` of the running executable, as placed by the linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkerStatics;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
impl StaticSegment for LinkerStatics {
  fn static_range(&self) -> AddressRange {
    unsafe extern "C" {
      static __data_start: u8;
      static end: u8;
    }

    let (start, stop) = unsafe { (&raw const __data_start as usize, &raw const end as usize) };
    AddressRange::new(start, stop)
  }
}

#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
impl StaticSegment for LinkerStatics {
  fn static_range(&self) -> AddressRange {
    warn!("static segment bounds unknown on this platform, statics are not scanned");
    AddressRange::EMPTY
  }
}

/// Stack of the thread that created it, with the bottom recorded once.
#[derive(Debug, Clone, Copy)]
pub struct ThreadStack {
  bottom: usize,
}

impl ThreadStack {
  /// Records the calling thread's stack bottom with the given strategy.
  #[inline(always)]
  pub fn record(strategy: StackBottom) -> Self {
    match strategy {
      StackBottom::Query => Self::query(),
      StackBottom::Heuristic { offset } => Self::heuristic(offset),
    }
  }

  /// Asks the OS for the calling thread's stack bounds.
  pub fn query() -> Self {
    match query_stack_bottom() {
      Some(bottom) => {
        debug!(bottom = format_args!("{bottom:#x}"), "stack bottom from OS");
        Self { bottom }
      }
      None => {
        warn!("OS did not report a stack bottom, using frame heuristic");
        Self::heuristic(HEURISTIC_STACK_OFFSET)
      }
    }
  }

  /// Places the bottom `offset` bytes above the recording frame. Only frames
  /// younger than that point are ever scanned.
  #[inline(always)]
  pub fn heuristic(offset: usize) -> Self {
    let bottom = frame_address().saturating_add(offset);
    debug!(bottom = format_args!("{bottom:#x}"), offset, "stack bottom from frame heuristic");
    Self { bottom }
  }

  pub fn bottom(&self) -> usize {
    self.bottom
  }
}

impl StackBounds for ThreadStack {
  fn stack_range(
    &self,
    frame: usize,
  ) -> AddressRange {
    AddressRange::new(frame, self.bottom)
  }
}

#[cfg(target_os = "linux")]
fn query_stack_bottom() -> Option<usize> {
  use std::mem::MaybeUninit;

  unsafe {
    let mut attr = MaybeUninit::<libc::pthread_attr_t>::uninit();
    if libc::pthread_getattr_np(libc::pthread_self(), attr.as_mut_ptr()) != 0 {
      return None;
    }

    let mut low: *mut libc::c_void = std::ptr::null_mut();
    let mut size: libc::size_t = 0;
    let status = libc::pthread_attr_getstack(attr.as_ptr(), &mut low, &mut size);
    libc::pthread_attr_destroy(attr.as_mut_ptr());

    if status != 0 || low.is_null() {
      return None;
    }
    Some(low as usize + size)
  }
}

#[cfg(target_os = "macos")]
fn query_stack_bottom() -> Option<usize> {
  let top = unsafe { libc::pthread_get_stackaddr_np(libc::pthread_self()) };
  if top.is_null() { None } else { Some(top as usize) }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn query_stack_bottom() -> Option<usize> {
  None
}

/// A fixed region standing in for statics or the stack.
///
/// Lets a collector be rooted in memory the caller owns, such as a slot
/// array, instead of the real process segments.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion(pub AddressRange);

impl FixedRegion {
  pub fn covering<T: ?Sized>(value: &T) -> Self {
    Self(AddressRange::of(value))
  }
}

impl StaticSegment for FixedRegion {
  fn static_range(&self) -> AddressRange {
    self.0
  }
}

impl StackBounds for FixedRegion {
  fn stack_range(
    &self,
    _frame: usize,
  ) -> AddressRange {
    self.0
  }
}

/// Contributes no roots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRoots;

impl StaticSegment for NoRoots {
  fn static_range(&self) -> AddressRange {
    AddressRange::EMPTY
  }
}

impl StackBounds for NoRoots {
  fn stack_range(
    &self,
    _frame: usize,
  ) -> AddressRange {
    AddressRange::EMPTY
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  // Interior mutability keeps this out of read-only data.
  static IN_DATA: AtomicUsize = AtomicUsize::new(0x1234);

  #[test]
  fn queried_bottom_is_above_current_frame() {
    let stack = ThreadStack::query();
    let frame = frame_address();

    assert!(stack.bottom() > frame);
    let range = stack.stack_range(frame);
    assert!(range.contains(frame));
  }

  #[test]
  fn heuristic_bottom_sits_above_recording_frame() {
    let stack = ThreadStack::heuristic(HEURISTIC_STACK_OFFSET);
    assert!(stack.bottom() > frame_address());
  }

  #[test]
  fn frame_above_bottom_scans_nothing() {
    let stack = ThreadStack { bottom: 0x1000 };
    assert!(stack.stack_range(0x2000).is_empty());
  }

  #[cfg(all(target_os = "linux", target_env = "gnu"))]
  #[test]
  fn linker_statics_cover_a_static() {
    let range = LinkerStatics.static_range();
    assert!(range.contains(&IN_DATA as *const AtomicUsize as usize));
  }

  #[test]
  fn fixed_region_reports_its_range_for_both_roles() {
    let slots = [0usize; 3];
    let region = FixedRegion::covering(&slots);

    assert_eq!(region.static_range(), AddressRange::of(&slots));
    assert_eq!(region.stack_range(0), AddressRange::of(&slots));
    assert!(NoRoots.static_range().is_empty());
    assert!(NoRoots.stack_range(frame_address()).is_empty());
    assert_eq!(IN_DATA.load(Ordering::Relaxed), 0x1234);
  }
}
