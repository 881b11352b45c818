//! # Frame Buffer Description

use core::fmt;
use core::mem::{offset_of, size_of};

/// Pixel layout of the linear frame buffer.
///
/// Only the two 32-bit direct-color layouts are supported. Formats that need
/// per-channel bit masks, or expose no linear frame buffer at all, are rejected
/// by the loader.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32 bits per pixel, bytes R, G, B, reserved from low to high address.
    RgbReserved8BitPerColor = 0,
    /// 32 bits per pixel, bytes B, G, R, reserved from low to high address.
    BgrReserved8BitPerColor = 1,
}

impl PixelFormat {
    /// Both supported layouts use four bytes per pixel.
    pub const BYTES_PER_PIXEL: u32 = 4;

    /// Encodes an RGB triple in this layout, ready to be stored as one pixel.
    #[must_use]
    pub const fn encode(self, r: u8, g: u8, b: u8) -> [u8; 4] {
        match self {
            Self::RgbReserved8BitPerColor => [r, g, b, 0],
            Self::BgrReserved8BitPerColor => [b, g, r, 0],
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RgbReserved8BitPerColor => f.write_str("RGB (reserved, 8 bit per color)"),
            Self::BgrReserved8BitPerColor => f.write_str("BGR (reserved, 8 bit per color)"),
        }
    }
}

/// Frame buffer handed from the loader to the kernel.
///
/// Keep this `#[repr(C)]`; it crosses the boot/kernel boundary by reference.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameBufferConfig {
    /// Physical base address of the linear frame buffer.
    pub frame_buffer: u64,

    /// Pixels per scan line, i.e. the memory stride. May exceed
    /// [`horizontal_resolution`](Self::horizontal_resolution) due to padding.
    pub pixels_per_scan_line: u32,

    /// Visible width in pixels.
    pub horizontal_resolution: u32,

    /// Visible height in pixels.
    pub vertical_resolution: u32,

    /// Pixel layout.
    pub pixel_format: PixelFormat,
}

const _: () = {
    assert!(offset_of!(FrameBufferConfig, frame_buffer) == 0);
    assert!(offset_of!(FrameBufferConfig, pixels_per_scan_line) == 8);
    assert!(offset_of!(FrameBufferConfig, horizontal_resolution) == 12);
    assert!(offset_of!(FrameBufferConfig, vertical_resolution) == 16);
    assert!(offset_of!(FrameBufferConfig, pixel_format) == 20);
    assert!(size_of::<FrameBufferConfig>() == 24);
};

impl FrameBufferConfig {
    /// Byte offset of pixel `(x, y)` from the frame buffer base, or `None` if the
    /// pixel is outside the visible area.
    #[must_use]
    pub const fn pixel_offset(&self, x: u32, y: u32) -> Option<u64> {
        if x >= self.horizontal_resolution || y >= self.vertical_resolution {
            return None;
        }
        let index = y as u64 * self.pixels_per_scan_line as u64 + x as u64;
        Some(index * PixelFormat::BYTES_PER_PIXEL as u64)
    }

    /// Number of bytes spanned by the visible rows, stride included.
    #[must_use]
    pub const fn size_in_bytes(&self) -> u64 {
        self.vertical_resolution as u64
            * self.pixels_per_scan_line as u64
            * PixelFormat::BYTES_PER_PIXEL as u64
    }
}
