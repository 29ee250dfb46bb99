//! # rcollector - A Conservative Mark and Sweep Collector
//!
//! This crate provides an allocator whose memory never has to be freed by
//! hand. Blocks come from `sbrk(2)` (or any other [`HeapGrowth`]), and a
//! collection decides which of them are still in use by looking for their
//! addresses in raw memory, with no type information at all.
//!
//! ## Overview
//!
//! ```text
//!   Ledger (insertion order, append only):
//!
//!   ┌────────┬──────┐   ┌────────┬──────────┐   ┌────────┬────┐
//!   │ header │ A    │──▶│ header │ B        │──▶│ header │ C  │──▶ null
//!   │ freed  │      │   │ in use │ &A       │   │ freed  │    │
//!   └────────┴──────┘   └────────┴──────────┘   └────────┴────┘
//!
//!   allocate(n): first freed block with size >= n, else grow the heap.
//!   collect():   mark from statics, stack and every payload, then sweep.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   rcollector
//!   ├── align      - Word rounding (align!) and scan stride helpers
//!   ├── allocator  - BlockAllocator, the first-fit ledger
//!   ├── block      - Block header and payload ranges
//!   ├── collector  - Collector, conservative mark and sweep
//!   ├── config     - Environment driven settings
//!   ├── error      - GcError
//!   ├── global     - One process-wide collector
//!   ├── heap       - HeapGrowth, Sbrk, ArenaHeap
//!   ├── logging    - tracing subscriber setup
//!   ├── range      - AddressRange
//!   └── roots      - Static segment and stack bounds
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rcollector::{Collector, LinkerStatics, Sbrk, ThreadStack};
//!
//! fn main() {
//!     let mut gc = Collector::new(Sbrk, LinkerStatics, ThreadStack::query());
//!
//!     let kept = gc.allocate(32).unwrap();
//!     gc.allocate(64);                        // never stored anywhere
//!
//!     gc.collect().unwrap();
//!     assert_eq!(gc.memory_in_use(), 32);     // `kept` is still on the stack
//!     std::hint::black_box(&kept);
//! }
//! ```
//!
//! ## Limitations
//!
//! - **Conservative**: any word that looks like an address inside a payload
//!   keeps that block, including stale words in freed blocks.
//! - **No splitting or coalescing**: a reused block keeps its full size.
//! - **Single-threaded**: a collector scans only the stack it was built on.
//! - **Unscanned memory**: pointers kept only in registers, in memory from
//!   other allocators, or in read-only statics do not count as roots.
//!
//! ## Safety
//!
//! Collections read arbitrary bytes of the static segment and the stack.
//! Root providers must only report ranges that are mapped and readable.

pub mod align;
mod allocator;
mod block;
mod collector;
pub mod config;
mod error;
pub mod global;
pub mod heap;
pub mod logging;
mod range;
pub mod roots;

pub use allocator::{BlockAllocator, Blocks};
pub use block::{Block, BlockInfo};
pub use collector::{CollectStats, Collector};
pub use error::{GcError, Result};
pub use heap::{ArenaHeap, HeapGrowth, Sbrk};
pub use range::AddressRange;
pub use roots::{FixedRegion, LinkerStatics, NoRoots, StackBounds, StaticSegment, ThreadStack};
