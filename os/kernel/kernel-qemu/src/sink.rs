use core::fmt;

/// QEMU's `-debugcon` I/O port.
#[cfg(feature = "enabled")]
const QEMU_DEBUG_PORT: u16 = 0x402;

/// `fmt::Write` adapter for the QEMU debug console.
///
/// Bytes are written one by one with no buffering. On real hardware the port is
/// normally unused and writes vanish.
#[derive(Debug, Default, Copy, Clone)]
pub struct QemuSink;

#[allow(clippy::unused_self, clippy::needless_pass_by_ref_mut)]
impl QemuSink {
    /// Writes raw bytes to the debug port.
    #[cfg(feature = "enabled")]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            // SAFETY: writing the debug port has no effect on memory.
            unsafe { outb(QEMU_DEBUG_PORT, b) }
        }
    }

    #[cfg(not(feature = "enabled"))]
    pub const fn write_bytes(&mut self, _bytes: &[u8]) {}
}

impl fmt::Write for QemuSink {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes());
        Ok(())
    }
}

#[cfg(feature = "enabled")]
#[allow(clippy::inline_always)]
#[inline(always)]
unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!(
            "out dx, al",
            in("dx") port,
            in("al") val,
            options(nomem, nostack, preserves_flags)
        );
    }
}
