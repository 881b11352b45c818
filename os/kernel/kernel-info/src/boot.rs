//! # Kernel Entry Convention

use crate::framebuffer::FrameBufferConfig;
use crate::memory_map::MemoryMap;

/// Kernel function pointer.
///
/// The loader reads this address from the `e_entry` field of the kernel's ELF
/// header and calls it once boot services have been exited.
///
/// # ABI
/// The ABI is pinned to `sysv64`. The loader is a PE/COFF image whose default
/// convention is `win64`, whereas the kernel is a freestanding ELF binary;
/// spelling the convention out keeps both sides in agreement. Arguments arrive
/// in `RDI` (frame buffer) and `RSI` (memory map).
///
/// Both pointers refer to loader memory that stays intact until the kernel
/// starts reusing boot-services memory.
pub type KernelEntryFn =
    extern "sysv64" fn(frame_buffer: *const FrameBufferConfig, memory_map: *const MemoryMap) -> !;
