//! Walks through the collector's basic guarantees against the process-wide
//! instance. Run with `RUST_LOG=rcollector=debug` to watch each phase.

use std::{hint::black_box, process, ptr::NonNull};

use rcollector::{global, heap::program_break, logging::init_logging};
use tracing::{error, info};

/// Logs the failure and exits non-zero when `$cond` does not hold.
macro_rules! check {
  ($cond:expr, $($arg:tt)+) => {
    if !$cond {
      error!($($arg)+);
      process::exit(1);
    }
  };
}

fn addr(payload: NonNull<u8>) -> usize {
  payload.as_ptr() as usize
}

/// Keeps the callee's locals 4 KiB below the caller, out of the range a
/// later collection from the caller scans.
#[inline(never)]
fn below<R>(f: impl FnOnce() -> R) -> R {
  let pad = [0u8; 4096];
  black_box(&pad);
  let result = run(f);
  black_box(&pad);
  result
}

#[inline(never)]
fn run<R>(f: impl FnOnce() -> R) -> R {
  f()
}

fn reuse() {
  info!("reuse: begin");
  below(|| {
    let a = global::allocate(1);
    black_box(&a);
    check!(global::collect().is_ok(), "collection failed");
    let b = global::allocate(1);
    check!(a != b, "overwrote memory that was still being used");
    black_box(&a);
  });
  info!("reuse: done");
}

fn stack() {
  info!("stack: begin");
  let before = global::memory_in_use();

  below(|| {
    let a = global::allocate(1).map(addr);
    black_box(&a);
    let in_use = global::memory_in_use();
    check!(in_use == before + 1, "allocation not accounted, got {in_use}");
    check!(global::collect().is_ok(), "collection failed");
    check!(global::memory_in_use() == before + 1, "reference to {a:x?} on the stack was missed");
    black_box(&a);
  });

  check!(global::collect().is_ok(), "collection failed");
  let in_use = global::memory_in_use();
  check!(in_use == 0, "stack garbage survived, {in_use} bytes in use");
  info!("stack: done");
}

fn heap() {
  info!("heap: begin");

  below(|| {
    let target = global::allocate(1);
    let holder = global::allocate(size_of::<usize>());
    if let (Some(target), Some(holder)) = (target, holder) {
      unsafe { (holder.as_ptr() as *mut usize).write_unaligned(addr(target)) };
      black_box(&holder);
      check!(global::collect().is_ok(), "collection failed");
      check!(global::memory_in_use() >= 1 + size_of::<usize>(), "reference held in the heap was missed");
      unsafe { (holder.as_ptr() as *mut usize).write_unaligned(0) };
      black_box(&holder);
    } else {
      check!(false, "heap exhausted");
    }
  });

  check!(global::collect().is_ok(), "collection failed");
  let in_use = global::memory_in_use();
  check!(in_use == 0, "heap garbage survived, {in_use} bytes in use");
  info!("heap: done");
}

fn main() {
  init_logging();
  global::init();
  info!(program_break = ?program_break(), "start");

  check!(global::collect().is_err(), "collected before anything was allocated");

  stack();
  heap();
  reuse();

  info!(
    in_use = global::memory_in_use(),
    committed = global::heap_committed(),
    program_break = ?program_break(),
    "all scenarios passed"
  );
}
