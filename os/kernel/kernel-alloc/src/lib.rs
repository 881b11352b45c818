//! # Physical Frame Allocation
//!
//! This crate manages physical memory in 4 KiB frames for the lifetime of the
//! kernel. It is the first allocator to exist: nothing in the kernel may use
//! dynamic memory before it is initialized, so it works entirely on storage
//! handed to it by the caller.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │             Firmware memory map (hand-off)          │
//! │    • descriptors with runtime stride                │
//! │    • available vs. reserved memory types            │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ init_from_memory_map
//! ┌─────────────────▼───────────────────────────────────┐
//! │              BitmapMemoryManager                    │
//! │    • one bit per frame, 1 = allocated               │
//! │    • first-fit contiguous search in a frame range   │
//! │    • caller-provided bitmap storage                 │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! * [`FrameId`]: index of a physical frame; `address = id * 4096`.
//! * [`BitmapMemoryManager`]: the allocator. The bitmap is the only source of
//!   truth for the state of a frame; there is no free list to go stale.
//! * [`BitmapMemoryManager::init_from_memory_map`]: derives the managed range
//!   and the reserved regions from the firmware memory map.
//! * [`SharedFrameManager`]: the kernel-global instance, initialized once and
//!   locked for each use.
//!
//! ## Sizing
//!
//! The kernel reserves a static bitmap of [`BITMAP_LINES`] words, enough to
//! describe [`MAX_PHYSICAL_MEMORY_BYTES`] of RAM. Memory above that ceiling is
//! ignored. Tests construct the manager over small `Vec`-backed bitmaps.
//!
//! ## Concurrency
//!
//! The manager itself is single-threaded and takes `&mut self` everywhere.
//! [`SharedFrameManager`] puts it behind a spin lock so that the scan-then-mark
//! sequence of [`allocate`](BitmapMemoryManager::allocate), `free` and
//! `mark_allocated` never interleave.
//!
//! ## Usage
//! ```rust
//! use kernel_alloc::{BitmapMemoryManager, FrameId};
//!
//! let mut manager = BitmapMemoryManager::new(vec![0u64; 4]);
//! manager.set_memory_range(FrameId::new(1), FrameId::new(200)).unwrap();
//! manager.mark_allocated(FrameId::new(1), 9);
//!
//! let frames = manager.allocate(3).unwrap();
//! assert_eq!(frames, FrameId::new(10));
//! assert_eq!(frames.address(), 10 * 4096);
//! manager.free(frames, 3);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod bitmap;
mod frame;
mod global;
mod memory_map;

pub use bitmap::{AllocError, Bitmap, BitmapMemoryManager, MapLine};
pub use frame::{FrameId, NULL_FRAME};
pub use global::SharedFrameManager;

use kernel_info::memory::{gib, kib};

/// Size of one physical frame.
pub const BYTES_PER_FRAME: u64 = kib(4);

/// Highest amount of physical memory the static bitmap can describe.
pub const MAX_PHYSICAL_MEMORY_BYTES: u64 = gib(128);

/// Number of frames below [`MAX_PHYSICAL_MEMORY_BYTES`].
#[allow(clippy::cast_possible_truncation)]
pub const FRAME_COUNT: usize = (MAX_PHYSICAL_MEMORY_BYTES / BYTES_PER_FRAME) as usize;

/// Frames tracked by one bitmap word.
pub const BITS_PER_MAP_LINE: usize = MapLine::BITS as usize;

/// Words in a bitmap covering [`FRAME_COUNT`] frames.
pub const BITMAP_LINES: usize = FRAME_COUNT / BITS_PER_MAP_LINE;

const _: () = {
    assert!(FRAME_COUNT.is_multiple_of(BITS_PER_MAP_LINE));
    assert!(BYTES_PER_FRAME == kernel_info::memory::UEFI_PAGE_SIZE);
};
