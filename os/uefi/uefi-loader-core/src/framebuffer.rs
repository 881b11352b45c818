//! # Frame Buffer Translation

use crate::BootError;
use kernel_info::framebuffer::{FrameBufferConfig, PixelFormat};
use uefi::proto::console::gop::PixelFormat as GopPixelFormat;

/// Maps the GOP pixel format onto the kernel's.
///
/// # Errors
/// [`BootError::UnsupportedPixelFormat`] for bit-mask and blit-only modes.
pub const fn translate_pixel_format(format: GopPixelFormat) -> Result<PixelFormat, BootError> {
    match format {
        GopPixelFormat::Rgb => Ok(PixelFormat::RgbReserved8BitPerColor),
        GopPixelFormat::Bgr => Ok(PixelFormat::BgrReserved8BitPerColor),
        GopPixelFormat::Bitmask | GopPixelFormat::BltOnly => {
            Err(BootError::UnsupportedPixelFormat(pixel_format_name(format)))
        }
    }
}

/// Firmware name of a GOP pixel format.
#[must_use]
pub const fn pixel_format_name(format: GopPixelFormat) -> &'static str {
    match format {
        GopPixelFormat::Rgb => "PixelRedGreenBlueReserved8BitPerColor",
        GopPixelFormat::Bgr => "PixelBlueGreenRedReserved8BitPerColor",
        GopPixelFormat::Bitmask => "PixelBitMask",
        GopPixelFormat::BltOnly => "PixelBltOnly",
    }
}

/// Mode information as reported by the Graphics Output Protocol.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct GopMode {
    pub frame_buffer_base: u64,
    pub frame_buffer_size: usize,
    pub resolution: (usize, usize),
    pub stride: usize,
    pub pixel_format: GopPixelFormat,
}

/// Builds the kernel's frame buffer description from the current GOP mode.
///
/// # Errors
/// [`BootError::UnsupportedPixelFormat`] as for [`translate_pixel_format`], and
/// [`BootError::GraphicsOutput`] if a dimension does not fit 32 bits.
pub fn frame_buffer_config(mode: &GopMode) -> Result<FrameBufferConfig, BootError> {
    let pixel_format = translate_pixel_format(mode.pixel_format)?;
    let dimension = |value: usize| {
        u32::try_from(value).map_err(|_| BootError::GraphicsOutput(uefi::Status::UNSUPPORTED))
    };
    Ok(FrameBufferConfig {
        frame_buffer: mode.frame_buffer_base,
        pixels_per_scan_line: dimension(mode.stride)?,
        horizontal_resolution: dimension(mode.resolution.0)?,
        vertical_resolution: dimension(mode.resolution.1)?,
        pixel_format,
    })
}
