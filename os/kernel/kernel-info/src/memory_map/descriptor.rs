//! # UEFI Memory Descriptor Codec
//!
//! Descriptors are decoded from and encoded into their little-endian byte form
//! field by field. The firmware layout (UEFI 2.x, `EFI_MEMORY_DESCRIPTOR`) is:
//!
//! | Offset | Width | Field           |
//! |-------:|------:|-----------------|
//! |      0 |     4 | `Type`          |
//! |      4 |     4 | padding         |
//! |      8 |     8 | `PhysicalStart` |
//! |     16 |     8 | `VirtualStart`  |
//! |     24 |     8 | `NumberOfPages` |
//! |     32 |     8 | `Attribute`     |
//!
//! Firmware may append trailing bytes to every entry; those are skipped by the
//! caller through the runtime descriptor stride and never seen here.

use crate::memory::UEFI_PAGE_SIZE;
use bitfield_struct::bitfield;
use core::fmt;

const TYPE_OFFSET: usize = 0;
const PHYSICAL_START_OFFSET: usize = 8;
const VIRTUAL_START_OFFSET: usize = 16;
const NUMBER_OF_PAGES_OFFSET: usize = 24;
const ATTRIBUTE_OFFSET: usize = 32;

/// Memory class of a descriptor (`EFI_MEMORY_TYPE`).
///
/// Kept as an open newtype: firmware and OS vendors may report values outside
/// the architected range, which must survive decoding unchanged.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct MemoryType(pub u32);

impl MemoryType {
    pub const RESERVED: Self = Self(0);
    pub const LOADER_CODE: Self = Self(1);
    pub const LOADER_DATA: Self = Self(2);
    pub const BOOT_SERVICES_CODE: Self = Self(3);
    pub const BOOT_SERVICES_DATA: Self = Self(4);
    pub const RUNTIME_SERVICES_CODE: Self = Self(5);
    pub const RUNTIME_SERVICES_DATA: Self = Self(6);
    pub const CONVENTIONAL: Self = Self(7);
    pub const UNUSABLE: Self = Self(8);
    pub const ACPI_RECLAIM: Self = Self(9);
    pub const ACPI_NON_VOLATILE: Self = Self(10);
    pub const MMIO: Self = Self(11);
    pub const MMIO_PORT_SPACE: Self = Self(12);
    pub const PAL_CODE: Self = Self(13);
    pub const PERSISTENT_MEMORY: Self = Self(14);

    /// Whether the kernel may claim this memory once boot services are gone.
    ///
    /// Only boot services code/data and conventional memory qualify. Loader
    /// code/data hold the kernel image and the hand-off structures, everything
    /// else belongs to firmware or devices.
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(
            self,
            Self::BOOT_SERVICES_CODE | Self::BOOT_SERVICES_DATA | Self::CONVENTIONAL
        )
    }

    /// Firmware name of the memory type, e.g. `EfiConventionalMemory`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RESERVED => "EfiReservedMemoryType",
            Self::LOADER_CODE => "EfiLoaderCode",
            Self::LOADER_DATA => "EfiLoaderData",
            Self::BOOT_SERVICES_CODE => "EfiBootServicesCode",
            Self::BOOT_SERVICES_DATA => "EfiBootServicesData",
            Self::RUNTIME_SERVICES_CODE => "EfiRuntimeServicesCode",
            Self::RUNTIME_SERVICES_DATA => "EfiRuntimeServicesData",
            Self::CONVENTIONAL => "EfiConventionalMemory",
            Self::UNUSABLE => "EfiUnusableMemory",
            Self::ACPI_RECLAIM => "EfiACPIReclaimMemory",
            Self::ACPI_NON_VOLATILE => "EfiACPIMemoryNVS",
            Self::MMIO => "EfiMemoryMappedIO",
            Self::MMIO_PORT_SPACE => "EfiMemoryMappedIOPortSpace",
            Self::PAL_CODE => "EfiPalCode",
            Self::PERSISTENT_MEMORY => "EfiPersistentMemory",
            _ => "InvalidMemoryType",
        }
    }
}

impl fmt::Debug for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.0)
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability and state bits of a memory region (`EFI_MEMORY_*`).
///
/// Layout (LSB→MSB):
/// - bits 0..4: cacheability (`UC`, `WC`, `WT`, `WB`, `UCE`)
/// - bits 12..19: protection and reliability (`WP`, `RP`, `XP`, `NV`,
///   `MORE_RELIABLE`, `RO`, `SP`, `CPU_CRYPTO`)
/// - bit 63: `RUNTIME`, region must be mapped for runtime services
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct MemoryAttribute {
    /// Uncacheable.
    pub uc: bool,
    /// Write-combining.
    pub wc: bool,
    /// Write-through.
    pub wt: bool,
    /// Write-back.
    pub wb: bool,
    /// Uncacheable, exported, supports the "fetch and add" semaphore mechanism.
    pub uce: bool,

    #[bits(7)]
    __reserved_low: u8,

    /// Write-protected.
    pub wp: bool,
    /// Read-protected.
    pub rp: bool,
    /// Execute-protected.
    pub xp: bool,
    /// Non-volatile (persistent) memory.
    pub nv: bool,
    /// Higher reliability than other memory in the system.
    pub more_reliable: bool,
    /// Read-only.
    pub ro: bool,
    /// Specific-purpose memory.
    pub sp: bool,
    /// Protected by CPU memory encryption.
    pub cpu_crypto: bool,

    #[bits(43)]
    __reserved_high: u64,

    /// Requires a virtual mapping for runtime services.
    pub runtime: bool,
}

impl MemoryAttribute {
    /// Bits shown in the diagnostic dump.
    pub const DISPLAY_MASK: u64 = 0xF_FFFF;
}

/// One decoded memory map entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryDescriptor {
    pub memory_type: MemoryType,
    pub physical_start: u64,
    pub virtual_start: u64,
    /// Region size in 4 KiB UEFI pages.
    pub number_of_pages: u64,
    pub attribute: MemoryAttribute,
}

impl MemoryDescriptor {
    /// Bytes covered by the architected fields. The firmware stride is at least this.
    pub const ENCODED_SIZE: usize = 40;

    /// Decodes the architected prefix of one descriptor.
    #[must_use]
    pub fn decode(bytes: &[u8; Self::ENCODED_SIZE]) -> Self {
        Self {
            memory_type: MemoryType(read_u32(bytes, TYPE_OFFSET)),
            physical_start: read_u64(bytes, PHYSICAL_START_OFFSET),
            virtual_start: read_u64(bytes, VIRTUAL_START_OFFSET),
            number_of_pages: read_u64(bytes, NUMBER_OF_PAGES_OFFSET),
            attribute: MemoryAttribute::from_bits(read_u64(bytes, ATTRIBUTE_OFFSET)),
        }
    }

    /// Encodes the descriptor into its firmware byte form, padding zeroed.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::ENCODED_SIZE] {
        let mut bytes = [0; Self::ENCODED_SIZE];
        write(&mut bytes, TYPE_OFFSET, &self.memory_type.0.to_le_bytes());
        write(&mut bytes, PHYSICAL_START_OFFSET, &self.physical_start.to_le_bytes());
        write(&mut bytes, VIRTUAL_START_OFFSET, &self.virtual_start.to_le_bytes());
        write(&mut bytes, NUMBER_OF_PAGES_OFFSET, &self.number_of_pages.to_le_bytes());
        write(&mut bytes, ATTRIBUTE_OFFSET, &self.attribute.into_bits().to_le_bytes());
        bytes
    }

    /// Region size in bytes, saturating on nonsensical page counts.
    #[must_use]
    pub const fn size_in_bytes(&self) -> u64 {
        self.number_of_pages.saturating_mul(UEFI_PAGE_SIZE)
    }

    /// Exclusive end address of the region.
    #[must_use]
    pub const fn physical_end(&self) -> u64 {
        self.physical_start.saturating_add(self.size_in_bytes())
    }

    /// See [`MemoryType::is_available`].
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.memory_type.is_available()
    }
}

fn read_u32(bytes: &[u8; MemoryDescriptor::ENCODED_SIZE], offset: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_u64(bytes: &[u8; MemoryDescriptor::ENCODED_SIZE], offset: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

fn write(bytes: &mut [u8; MemoryDescriptor::ENCODED_SIZE], offset: usize, field: &[u8]) {
    bytes[offset..offset + field.len()].copy_from_slice(field);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian_fields_at_firmware_offsets() {
        let mut raw = [0u8; MemoryDescriptor::ENCODED_SIZE];
        raw[0] = 7;
        raw[4] = 0xEE; // padding, ignored
        raw[8..16].copy_from_slice(&0x0010_0000u64.to_le_bytes());
        raw[16..24].copy_from_slice(&0xdead_0000u64.to_le_bytes());
        raw[24..32].copy_from_slice(&0x20u64.to_le_bytes());
        raw[32..40].copy_from_slice(&((1u64 << 63) | 0xF).to_le_bytes());

        let d = MemoryDescriptor::decode(&raw);
        assert_eq!(d.memory_type, MemoryType::CONVENTIONAL);
        assert_eq!(d.physical_start, 0x0010_0000);
        assert_eq!(d.virtual_start, 0xdead_0000);
        assert_eq!(d.number_of_pages, 0x20);
        assert!(d.attribute.runtime());
        assert!(d.attribute.uc() && d.attribute.wb());
        assert!(!d.attribute.xp());
        assert_eq!(d.physical_end(), 0x0010_0000 + 0x20 * 4096);
    }

    #[test]
    fn encode_zeroes_padding() {
        let d = MemoryDescriptor {
            memory_type: MemoryType::ACPI_RECLAIM,
            physical_start: 0x1000,
            virtual_start: 0,
            number_of_pages: 1,
            attribute: MemoryAttribute::new().with_wb(true).with_xp(true),
        };
        let raw = d.encode();
        assert_eq!(&raw[4..8], &[0, 0, 0, 0]);
        assert_eq!(MemoryDescriptor::decode(&raw), d);
        assert_eq!(d.attribute.into_bits(), (1 << 3) | (1 << 14));
    }

    #[test]
    fn only_reclaimable_types_are_available() {
        let available: Vec<u32> = (0..=20)
            .filter(|&t| MemoryType(t).is_available())
            .collect();
        assert_eq!(available, [3, 4, 7]);
    }

    #[test]
    fn unknown_types_keep_their_value() {
        let vendor = MemoryType(0x8000_0001);
        assert_eq!(vendor.name(), "InvalidMemoryType");
        assert_eq!(format!("{vendor:?}"), "InvalidMemoryType(2147483649)");
        assert_eq!(MemoryType::MMIO.to_string(), "EfiMemoryMappedIO");
    }
}
