//! # QEMU Debug Console
//!
//! Debug output for code running under QEMU, usable from the first instruction
//! of the loader to the kernel's panic handler. Nothing here allocates.
//!
//! ## Output Path
//! ```text
//! log::info!(..)          qemu_trace!(..)
//!       ↓                       ↓
//! QemuLogger ── LogLine ──▶ QemuSink (fmt::Write)
//!                               ↓
//!                        out 0x402, al
//!                               ↓
//!                  -debugcon stdio / file:debug.log
//! ```
//!
//! * [`QemuLogger`]: `log::Log` backend writing `"[LEVEL] target: message\n"`.
//! * [`LogLine`]: the record format, shared with other log backends.
//! * [`qemu_trace!`]: raw formatted output, bypassing `log`.
//!
//! ## Features
//! `enabled` (default) compiles the port I/O in. Without it every write is a
//! no-op, which is what host-side tests and non-QEMU builds use.
//!
//! ## Usage
//! ```rust,no_run
//! use kernel_qemu::QemuLogger;
//! use log::LevelFilter;
//!
//! static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);
//!
//! LOGGER.init().expect("logger initialization");
//! log::info!("Kernel subsystem initialized");
//! ```
//!
//! Capture the output on the host with `qemu-system-x86_64 ... -debugcon stdio`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod sink;

pub use logger::{LogLine, QemuLogger};
pub use sink::QemuSink;

#[doc(hidden)]
pub mod qemu_fmt {
    use core::fmt;

    #[doc(hidden)]
    #[inline]
    pub fn qemu_write(args: fmt::Arguments) {
        // Best-effort debug output.
        let _ = fmt::write(&mut crate::QemuSink, args);
    }
}

/// Writes formatted text to the QEMU debug console. No newline is appended.
#[macro_export]
macro_rules! qemu_trace {
    ($($arg:tt)*) => {{
        $crate::qemu_fmt::qemu_write(core::format_args!($($arg)*));
    }};
}
