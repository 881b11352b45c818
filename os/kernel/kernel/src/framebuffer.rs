//! # Kernel Framebuffer helpers

use kernel_info::framebuffer::FrameBufferConfig;

/// Paints every visible pixel in one color.
///
/// # Safety
/// `config` must describe a mapped, writable linear frame buffer.
pub unsafe fn fill_solid(config: &FrameBufferConfig, r: u8, g: u8, b: u8) {
    let pixel = config.pixel_format.encode(r, g, b);
    for y in 0..config.vertical_resolution {
        for x in 0..config.horizontal_resolution {
            let Some(offset) = config.pixel_offset(x, y) else {
                continue;
            };
            let address = usize::try_from(config.frame_buffer + offset).unwrap_or_default();
            let ptr = core::ptr::with_exposed_provenance_mut::<[u8; 4]>(address);
            // SAFETY: `offset` lies inside the visible area of the frame buffer.
            unsafe { ptr.write_volatile(pixel) };
        }
    }
}
