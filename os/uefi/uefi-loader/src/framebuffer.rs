//! # GOP for the Kernel

use log::info;
use uefi::proto::console::gop::GraphicsOutput;
use uefi::{Status, boot};
use uefi_loader_core::framebuffer::{GopMode, pixel_format_name};

/// Reads the current mode of the first Graphics Output Protocol instance.
///
/// The protocol is closed again before returning; the frame buffer itself stays
/// valid after boot services are gone.
///
/// # Errors
/// Returns the [`Status`] of the failed protocol call.
pub fn current_gop_mode() -> Result<GopMode, Status> {
    let handle = boot::get_handle_for_protocol::<GraphicsOutput>().map_err(|e| e.status())?;
    let mut gop = boot::open_protocol_exclusive::<GraphicsOutput>(handle).map_err(|e| e.status())?;

    let info = gop.current_mode_info();
    let mut frame_buffer = gop.frame_buffer();
    let mode = GopMode {
        frame_buffer_base: frame_buffer.as_mut_ptr() as u64,
        frame_buffer_size: frame_buffer.size(),
        resolution: info.resolution(),
        stride: info.stride(),
        pixel_format: info.pixel_format(),
    };

    let (width, height) = mode.resolution;
    info!(
        "Resolution: {width}x{height}, Pixel Format: {}, {} pixels/line",
        pixel_format_name(mode.pixel_format),
        mode.stride
    );
    info!(
        "Frame Buffer: {:#x} - {:#x}, Size: {} bytes",
        mode.frame_buffer_base,
        mode.frame_buffer_base + mode.frame_buffer_size as u64,
        mode.frame_buffer_size
    );
    Ok(mode)
}
