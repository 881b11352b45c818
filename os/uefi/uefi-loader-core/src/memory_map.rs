//! # Memory Map Reader
//!
//! Captures the firmware memory map into a caller-supplied, fixed-capacity
//! buffer. Nothing here allocates: the buffer must be large enough up front
//! (see [`MEMORY_MAP_BUFFER_SIZE`](kernel_info::memory::MEMORY_MAP_BUFFER_SIZE)).

use core::fmt;
use kernel_info::memory_map::dump::{DUMP_HEADER, DumpLine};
use kernel_info::memory_map::{MemoryMap, MemoryMapError, MemoryMapView};
use uefi::Status;

/// The firmware services the boot handshake depends on.
///
/// Implemented over UEFI boot services by the loader, and by mocks in tests.
pub trait BootFirmware {
    /// `GetMemoryMap` into `buffer`, which is non-empty.
    ///
    /// # Errors
    /// The raw firmware status, e.g. [`Status::BUFFER_TOO_SMALL`].
    fn get_memory_map(&mut self, buffer: &mut [u8]) -> Result<MemoryMapMeta, Status>;

    /// `ExitBootServices` with the key of the latest memory map.
    ///
    /// # Errors
    /// The raw firmware status, typically [`Status::INVALID_PARAMETER`] for a
    /// stale key.
    fn exit_boot_services(&mut self, map_key: u64) -> Result<(), Status>;
}

/// Scalars reported alongside the memory map.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct MemoryMapMeta {
    /// Bytes of the buffer that hold descriptors.
    pub map_size: usize,
    pub map_key: u64,
    /// Stride between descriptors.
    pub descriptor_size: usize,
    pub descriptor_version: u32,
}

/// A memory map snapshot in caller-provided storage.
#[derive(Debug)]
pub struct MemoryMapBuffer<'buf> {
    buffer: &'buf mut [u8],
    meta: MemoryMapMeta,
}

impl<'buf> MemoryMapBuffer<'buf> {
    #[must_use]
    pub const fn new(buffer: &'buf mut [u8]) -> Self {
        Self {
            buffer,
            meta: MemoryMapMeta {
                map_size: 0,
                map_key: 0,
                descriptor_size: 0,
                descriptor_version: 0,
            },
        }
    }

    /// Fetches a fresh snapshot, replacing the previous one.
    ///
    /// The previous map key becomes stale as soon as any memory-affecting
    /// firmware call runs, so the handshake calls this again before retrying.
    ///
    /// # Errors
    /// * [`Status::BUFFER_TOO_SMALL`] if the buffer has no capacity, or the
    ///   firmware reports a map larger than the buffer.
    /// * Any status returned by the firmware.
    pub fn refresh<F>(&mut self, firmware: &mut F) -> Result<(), Status>
    where
        F: BootFirmware + ?Sized,
    {
        if self.buffer.is_empty() {
            return Err(Status::BUFFER_TOO_SMALL);
        }

        let meta = firmware.get_memory_map(self.buffer)?;
        if meta.map_size > self.buffer.len() {
            return Err(Status::BUFFER_TOO_SMALL);
        }
        self.meta = meta;
        Ok(())
    }

    #[must_use]
    pub const fn meta(&self) -> &MemoryMapMeta {
        &self.meta
    }

    #[must_use]
    pub const fn map_key(&self) -> u64 {
        self.meta.map_key
    }

    /// Capacity of the underlying storage.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Descriptor view of the current snapshot.
    ///
    /// # Errors
    /// Fails before the first successful [`refresh`](Self::refresh).
    pub fn view(&self) -> Result<MemoryMapView<'_>, MemoryMapError> {
        let bytes = self
            .buffer
            .get(..self.meta.map_size)
            .ok_or(MemoryMapError::SizeNotRepresentable)?;
        MemoryMapView::new(bytes, self.meta.descriptor_size)
    }

    /// The hand-off structure describing the current snapshot.
    ///
    /// It points into this buffer, which must therefore outlive the kernel's
    /// use of it.
    #[must_use]
    pub fn to_handoff(&self) -> MemoryMap {
        MemoryMap {
            buffer_size: self.buffer.len() as u64,
            buffer: self.buffer.as_ptr() as u64,
            map_size: self.meta.map_size as u64,
            map_key: self.meta.map_key,
            descriptor_size: self.meta.descriptor_size as u64,
            descriptor_version: self.meta.descriptor_version,
        }
    }
}

/// Writes the diagnostic dump: a header line, then one line per descriptor.
///
/// # Errors
/// Whatever the writer reports.
pub fn write_dump<W>(view: &MemoryMapView<'_>, out: &mut W) -> fmt::Result
where
    W: fmt::Write + ?Sized,
{
    out.write_str(DUMP_HEADER)?;
    for (index, descriptor) in view.iter().enumerate() {
        write!(
            out,
            "{}",
            DumpLine {
                index,
                descriptor: &descriptor
            }
        )?;
    }
    Ok(())
}
