use crate::qemu_trace;
use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing to the QEMU debug console.
pub struct QemuLogger {
    max_level: LevelFilter,
}

impl QemuLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Installs this logger. Call once during early init.
    ///
    /// # Errors
    /// Fails if another logger was installed before.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        qemu_trace!("{}", LogLine(record));
    }

    fn flush(&self) {}
}

/// Formats a record as `"[LEVEL] target: message\n"`.
pub struct LogLine<'a, 'r>(pub &'a Record<'r>);

impl fmt::Display for LogLine<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}] {}: {}", self.0.level(), self.0.target(), self.0.args())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn log_line_format() {
        assert_eq!(
            LogLine(
                &Record::builder()
                    .level(Level::Warn)
                    .target("uefi_loader::boot")
                    .args(format_args!("retrying with key {:#x}", 0x2a))
                    .build()
            )
            .to_string(),
            "[WARN] uefi_loader::boot: retrying with key 0x2a\n"
        );
    }

    #[test]
    fn level_filter_is_respected() {
        let logger = QemuLogger::new(LevelFilter::Info);
        let debug = Metadata::builder().level(Level::Debug).build();
        let error = Metadata::builder().level(Level::Error).build();
        assert!(!logger.enabled(&debug));
        assert!(logger.enabled(&error));
    }
}
