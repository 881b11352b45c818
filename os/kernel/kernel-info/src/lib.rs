//! # Kernel Boot Interface
//!
//! This crate defines the data structures and layout constants shared between
//! the UEFI loader and the kernel. It is the only contract between the two
//! halves of the boot path, and both sides are compiled against it so that the
//! byte layout of every hand-off structure is agreed upon by construction.
//!
//! ## Overview
//!
//! The loader discovers the frame buffer and the physical memory layout while
//! firmware boot services are still available, loads the kernel at a fixed
//! physical address and jumps into it. Everything the kernel needs to know
//! about the machine at that point travels in two structures:
//!
//! * [`FrameBufferConfig`](framebuffer::FrameBufferConfig): the linear frame
//!   buffer exposed by the Graphics Output Protocol.
//! * [`MemoryMap`](memory_map::MemoryMap): the firmware memory map snapshot
//!   whose map key was accepted by `ExitBootServices`.
//!
//! ```text
//! ┌─────────────────────┐  *const FrameBufferConfig  ┌─────────────────────┐
//! │     UEFI loader     │ ─────────────────────────▶ │       Kernel        │
//! │ (boot services on)  │  *const MemoryMap          │ (no firmware below) │
//! └─────────────────────┘ ─────────────────────────▶ └─────────────────────┘
//! ```
//!
//! ## Modules
//!
//! * [`boot`]: kernel entry point signature and calling convention.
//! * [`framebuffer`]: frame buffer description and pixel formats.
//! * [`memory_map`]: the memory map hand-off structure, the memory descriptor
//!   codec, a stride-aware descriptor view and the diagnostic dump format.
//! * [`memory`]: the fixed physical layout and byte-unit helpers.
//!
//! ## ABI Rules
//!
//! * Every structure crossing the boundary is `#[repr(C)]` and uses fixed-size
//!   integers. Pointers travel as `u64` physical addresses.
//! * Layouts are pinned with compile-time `offset_of!` assertions.
//! * Memory descriptors are never reinterpreted in place. They are decoded
//!   field by field from the raw buffer, always advancing by the runtime
//!   descriptor stride reported by the firmware.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod boot;
pub mod framebuffer;
pub mod memory;
pub mod memory_map;

pub use framebuffer::{FrameBufferConfig, PixelFormat};
pub use memory_map::{MemoryDescriptor, MemoryMap, MemoryMapView, MemoryType};
