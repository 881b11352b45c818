//! # Physical Memory Bootstrap

use kernel_alloc::{AllocError, BITMAP_LINES, Bitmap, BitmapMemoryManager, SharedFrameManager};
use kernel_info::memory_map::{MemoryMap, MemoryMapError};

/// The frame allocator over the kernel's static bitmap.
pub type FrameManager = BitmapMemoryManager<&'static mut Bitmap>;

/// One bit per frame up to the physical memory ceiling. Lives in `.bss`, which
/// the loader reserves as part of the kernel image.
static mut BITMAP: Bitmap = [0; BITMAP_LINES];

static FRAME_MANAGER: SharedFrameManager<&'static mut Bitmap> = SharedFrameManager::new();

#[derive(Debug, thiserror::Error)]
pub enum MemoryInitError {
    #[error("Invalid memory map: {0}")]
    MemoryMap(#[from] MemoryMapError),
    #[error("Invalid memory range: {0}")]
    Alloc(#[from] AllocError),
}

/// Builds the kernel's frame allocator from the hand-off memory map.
///
/// Only the first call can succeed; later calls fail with
/// [`AllocError::AlreadyInitialized`] and leave the allocator untouched.
///
/// # Safety
/// `memory_map` must point at a mapped buffer of at least `map_size` bytes
/// that is not written to during the call.
///
/// # Errors
/// Fails if the map cannot be read, describes no usable memory, or the
/// allocator was initialized before.
pub unsafe fn init(memory_map: &MemoryMap) -> Result<(), MemoryInitError> {
    // SAFETY: guaranteed by the caller.
    let view = unsafe { memory_map.view() }?;

    FRAME_MANAGER.init(
        // SAFETY: runs at most once, so this is the only reference to the bitmap.
        || unsafe { &mut *(&raw mut BITMAP) },
        &view,
    )?;
    Ok(())
}

/// Runs `f` on the frame allocator, or returns `None` before [`init`].
pub fn with_frame_manager<R>(f: impl FnOnce(&mut FrameManager) -> R) -> Option<R> {
    FRAME_MANAGER.with(f)
}
