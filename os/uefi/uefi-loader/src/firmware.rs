//! # Raw Boot Services
//!
//! `GetMemoryMap` and `ExitBootServices` are called through the raw boot
//! services table. The safe wrappers allocate their own map buffer and run their
//! own retry loop; the loader instead fills a static buffer and owns the retry.

use uefi::{Handle, Status};
use uefi_loader_core::{BootFirmware, MemoryMapMeta};

/// Resolves the raw boot services table, failing once it is gone.
macro_rules! boot_services {
    () => {{
        let system_table = uefi::table::system_table_raw().ok_or(Status::NOT_STARTED)?;
        // SAFETY: the system table stays valid for the lifetime of the image.
        let boot_services = unsafe { system_table.as_ref().boot_services };
        if boot_services.is_null() {
            return Err(Status::UNSUPPORTED);
        }
        boot_services
    }};
}

/// The boot services of the running firmware.
pub struct UefiFirmware {
    image: Handle,
}

impl UefiFirmware {
    /// The firmware this image was started by.
    #[must_use]
    pub fn current() -> Self {
        Self {
            image: uefi::boot::image_handle(),
        }
    }
}

impl BootFirmware for UefiFirmware {
    fn get_memory_map(&mut self, buffer: &mut [u8]) -> Result<MemoryMapMeta, Status> {
        let boot_services = boot_services!();

        let mut map_size = buffer.len();
        let mut map_key = 0usize;
        let mut descriptor_size = 0usize;
        let mut descriptor_version = 0u32;

        // SAFETY: the output pointers are valid and `map_size` bounds the buffer.
        let status = unsafe {
            ((*boot_services).get_memory_map)(
                &raw mut map_size,
                buffer.as_mut_ptr().cast(),
                &raw mut map_key,
                &raw mut descriptor_size,
                &raw mut descriptor_version,
            )
        };
        if status.is_error() {
            return Err(status);
        }

        Ok(MemoryMapMeta {
            map_size,
            map_key: map_key as u64,
            descriptor_size,
            descriptor_version,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn exit_boot_services(&mut self, map_key: u64) -> Result<(), Status> {
        let boot_services = boot_services!();

        // SAFETY: firmware validates the key; on success no boot service is
        // called again.
        // The `uefi` crate is not told about the exit. Its console and panic
        // handler still point at ConOut, so nothing after a successful exit
        // may log to the console or panic.
        let status =
            unsafe { ((*boot_services).exit_boot_services)(self.image.as_ptr(), map_key as usize) };
        if status.is_error() {
            Err(status)
        } else {
            Ok(())
        }
    }
}
