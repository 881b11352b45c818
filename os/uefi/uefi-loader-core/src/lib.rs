//! # Loader Core
//!
//! The firmware-independent half of the UEFI loader. Everything here is plain
//! data processing over byte buffers and a narrow [`BootFirmware`] seam, so it
//! runs unchanged on the host under `cargo test`.
//!
//! ## Boot Sequence
//!
//! ```text
//!  GetMemoryMap ──▶ open volume ──▶ GOP ──▶ read \kernel.elf
//!                                                 │
//!                         ┌───────────────────────┘
//!                         ▼
//!  ElfImage::parse ─▶ calc_load_address_range ─▶ AllocatePages(Address)
//!                                                 │
//!                         ┌───────────────────────┘
//!                         ▼
//!  copy_load_segments ─▶ FreePool ─▶ exit_and_hand_off ─▶ kernel entry
//!                                     (one retry)
//! ```
//!
//! The loader binary drives this sequence; this crate provides:
//!
//! * [`elf`]: ELF64 header parsing, load range computation and segment copy.
//! * [`memory_map`]: the firmware seam and the fixed-capacity map buffer.
//! * [`handoff`]: the `ExitBootServices` handshake.
//! * [`framebuffer`]: pixel format translation.
//! * [`BootError`]: one variant per boot step, each carrying the raw status.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod elf;
mod error;
pub mod framebuffer;
pub mod handoff;
pub mod memory_map;

pub use error::BootError;
pub use memory_map::{BootFirmware, MemoryMapBuffer, MemoryMapMeta};
