//! One collector for the whole process, over the real program break, the
//! executable's statics and the stack of the thread that started it.
//!
//! ```rust,ignore
//! fn main() {
//!     rcollector::global::init();
//!
//!     let bytes = rcollector::global::allocate(64);
//!     // ... no free needed ...
//!     rcollector::global::collect().unwrap();
//! }
//! ```
//!
//! The stack bottom is recorded by [`init`], or by the first allocation if
//! `init` was never called. Only the thread that recorded it may allocate or
//! collect afterwards.

use std::{
  ptr::NonNull,
  sync::{Mutex, MutexGuard, PoisonError},
  thread::{self, ThreadId},
};

use once_cell::sync::Lazy;
use tracing::{info, warn};

use crate::{
  collector::{CollectStats, Collector},
  config::Config,
  error::{GcError, Result},
  heap::Sbrk,
  roots::{LinkerStatics, ThreadStack},
};

type ProcessCollector = Collector<Sbrk, Option<LinkerStatics>, ThreadStack>;

struct Process {
  collector: ProcessCollector,
  owner: ThreadId,
}

// The ledger is only reached through the mutex, and only from `owner`.
unsafe impl Send for Process {}

static PROCESS: Lazy<Mutex<Option<Process>>> = Lazy::new(|| Mutex::new(None));

fn acquire_process() -> MutexGuard<'static, Option<Process>> {
  PROCESS.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Process {
  #[inline(always)]
  fn start() -> Self {
    let config = Config::from_env().unwrap_or_else(|error| {
      warn!(%error, "ignoring collector configuration");
      Config::default()
    });
    let stack = ThreadStack::record(config.stack_bottom);
    let statics = config.scan_statics.then_some(LinkerStatics);

    info!(
      stack_bottom = format_args!("{:#x}", stack.bottom()),
      scan_statics = config.scan_statics,
      "process collector started"
    );

    Self {
      collector: Collector::new(Sbrk, statics, stack),
      owner: thread::current().id(),
    }
  }

  fn check_owner(&self) -> Result<()> {
    if self.owner == thread::current().id() {
      Ok(())
    } else {
      Err(GcError::ForeignThread)
    }
  }
}

/// Records the stack bottom now, from the caller's frame. Call it early in
/// `main` when using [`StackBottom::Heuristic`](crate::config::StackBottom).
/// Does nothing if the process collector already exists.
#[inline(always)]
pub fn init() {
  let mut process = acquire_process();
  if process.is_none() {
    *process = Some(Process::start());
  }
}

/// Allocates `size` bytes from the process collector.
///
/// `None` for a zero size, an exhausted heap, or a call from a thread other
/// than the one that started the collector.
pub fn allocate(size: usize) -> Option<NonNull<u8>> {
  if size == 0 {
    return None;
  }

  let mut guard = acquire_process();
  let process = guard.get_or_insert_with(Process::start);

  if let Err(error) = process.check_owner() {
    warn!(%error, size, "allocation refused");
    return None;
  }
  process.collector.allocate(size)
}

/// Collects the process heap.
#[inline(never)]
pub fn collect() -> Result<CollectStats> {
  let mut guard = acquire_process();
  let process = guard.as_mut().ok_or(GcError::NothingToCollect)?;
  process.check_owner()?;
  process.collector.collect()
}

/// Bytes currently handed out by the process collector.
pub fn memory_in_use() -> usize {
  acquire_process()
    .as_ref()
    .map_or(0, |process| process.collector.memory_in_use())
}

/// Bytes held by every block the process collector ever created.
pub fn heap_committed() -> usize {
  acquire_process()
    .as_ref()
    .map_or(0, |process| process.collector.heap_committed())
}
