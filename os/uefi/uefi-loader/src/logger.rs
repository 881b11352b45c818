use core::fmt::Write;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_qemu::{LogLine, QemuSink};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Logs to the QEMU debug port and, while boot services are up, the console.
pub struct UefiLogger {
    max_level: LevelFilter,
    console: AtomicBool,
}

impl UefiLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            console: AtomicBool::new(true),
        }
    }

    /// Call this once during early init.
    ///
    /// # Errors
    /// Fails if another logger was installed before.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }

    /// Stops mirroring to the UEFI console.
    ///
    /// Must happen before the first `ExitBootServices` attempt: console output
    /// is a boot service call and may change the memory map key.
    pub fn exit_boot_services(&self) {
        self.console.store(false, Ordering::Release);
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = LogLine(record);
        let _ = write!(QemuSink, "{line}");

        if self.console.load(Ordering::Acquire) {
            uefi::print!("{line}");
        }
    }

    fn flush(&self) {}
}
