//! # ELF Header Parsing
//!
//! Fields are read at their fixed ELF64 offsets as little-endian integers; the
//! image buffer is never reinterpreted as a Rust struct.

use super::{ElfError, PT_LOAD};

const EI_MAGIC_BYTES: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const EV_CURRENT: u8 = 1;
const ET_EXEC: u16 = 2;
const EM_X86_64: u16 = 62;

const HEADER_SIZE: usize = 64;
const PROGRAM_HEADER_SIZE: usize = 56;

// Elf64_Ehdr
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;
const EI_VERSION: usize = 6;
const E_TYPE: usize = 16;
const E_MACHINE: usize = 18;
const E_VERSION: usize = 20;
const E_ENTRY: usize = 24;
const E_PHOFF: usize = 32;
const E_PHENTSIZE: usize = 54;
const E_PHNUM: usize = 56;

// Elf64_Phdr
const P_TYPE: usize = 0;
const P_FLAGS: usize = 4;
const P_OFFSET: usize = 8;
const P_VADDR: usize = 16;
const P_PADDR: usize = 24;
const P_FILESZ: usize = 32;
const P_MEMSZ: usize = 40;
const P_ALIGN: usize = 48;

/// A validated ELF64 x86-64 executable resident in memory.
///
/// Construction checks the file header, the bounds of the program header
/// table and every `PT_LOAD` segment: its file bytes lie inside the image,
/// `p_memsz >= p_filesz`, its address range does not wrap and it does not
/// overlap any other loadable segment.
#[derive(Debug, Copy, Clone)]
pub struct ElfImage<'a> {
    bytes: &'a [u8],
    entry: u64,
    phoff: usize,
    phnum: usize,
}

impl<'a> ElfImage<'a> {
    /// Size of `Elf64_Ehdr`.
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Size of `Elf64_Phdr`.
    pub const PROGRAM_HEADER_SIZE: usize = PROGRAM_HEADER_SIZE;

    /// Parses and validates a 64-bit little-endian x86-64 executable.
    ///
    /// # Errors
    /// Any [`ElfError`] describing the first violation found.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ElfError> {
        let header: &[u8; HEADER_SIZE] =
            bytes.first_chunk().ok_or(ElfError::TruncatedHeader)?;

        if header[..4] != EI_MAGIC_BYTES {
            return Err(ElfError::BadMagic);
        }
        if header[EI_CLASS] != ELFCLASS64 {
            return Err(ElfError::UnsupportedClass);
        }
        if header[EI_DATA] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding);
        }
        if header[EI_VERSION] != EV_CURRENT || le_u32(header, E_VERSION) != u32::from(EV_CURRENT) {
            return Err(ElfError::UnsupportedVersion);
        }

        let e_type = le_u16(header, E_TYPE);
        if e_type != ET_EXEC {
            return Err(ElfError::NotExecutable(e_type));
        }
        let machine = le_u16(header, E_MACHINE);
        if machine != EM_X86_64 {
            return Err(ElfError::UnsupportedMachine(machine));
        }
        let phentsize = le_u16(header, E_PHENTSIZE);
        if usize::from(phentsize) != Self::PROGRAM_HEADER_SIZE {
            return Err(ElfError::BadProgramHeaderSize(phentsize));
        }

        let phoff = usize::try_from(le_u64(header, E_PHOFF))
            .map_err(|_| ElfError::ProgramHeadersOutOfBounds)?;
        let phnum = usize::from(le_u16(header, E_PHNUM));
        let table_end = phnum
            .checked_mul(Self::PROGRAM_HEADER_SIZE)
            .and_then(|size| phoff.checked_add(size))
            .ok_or(ElfError::ProgramHeadersOutOfBounds)?;
        if table_end > bytes.len() {
            return Err(ElfError::ProgramHeadersOutOfBounds);
        }

        let image = Self {
            bytes,
            entry: le_u64(header, E_ENTRY),
            phoff,
            phnum,
        };
        image.validate_segments()?;
        image.validate_disjoint()?;
        Ok(image)
    }

    /// Entry point address, the `e_entry` field at byte offset 24.
    #[must_use]
    pub const fn entry(&self) -> u64 {
        self.entry
    }

    /// The whole file image.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// All program headers in table order.
    pub fn program_headers(&self) -> impl Iterator<Item = ProgramHeader> + Clone + use<'a> {
        let table = self
            .bytes
            .get(self.phoff..self.phoff + self.phnum * Self::PROGRAM_HEADER_SIZE)
            .unwrap_or_default();
        table
            .chunks_exact(Self::PROGRAM_HEADER_SIZE)
            .filter_map(|entry| entry.first_chunk().map(ProgramHeader::decode))
    }

    /// `PT_LOAD` headers together with their index in the program header table.
    pub fn load_segments(&self) -> impl Iterator<Item = (usize, ProgramHeader)> + Clone + use<'a> {
        self.program_headers()
            .enumerate()
            .filter(|(_, ph)| ph.is_load())
    }

    fn validate_segments(&self) -> Result<(), ElfError> {
        for (index, ph) in self.load_segments() {
            if ph.memsz < ph.filesz {
                return Err(ElfError::SegmentSizeMismatch { index });
            }
            let file_end = ph
                .offset
                .checked_add(ph.filesz)
                .ok_or(ElfError::SegmentOutOfBounds { index })?;
            if file_end > self.bytes.len() as u64 {
                return Err(ElfError::SegmentOutOfBounds { index });
            }
            if ph.end().is_none() {
                return Err(ElfError::AddressOverflow { index });
            }
        }
        Ok(())
    }

    /// Rejects images whose loadable segments share destination bytes.
    ///
    /// # Errors
    /// [`ElfError::OverlappingSegments`] naming the first conflicting pair.
    pub fn validate_disjoint(&self) -> Result<(), ElfError> {
        let occupied = self.load_segments().filter(|(_, ph)| ph.memsz > 0);
        for (first, a) in occupied.clone() {
            for (second, b) in occupied.clone().filter(|&(j, _)| j > first) {
                let (Some(a_end), Some(b_end)) = (a.end(), b.end()) else {
                    continue;
                };
                if a.vaddr < b_end && b.vaddr < a_end {
                    return Err(ElfError::OverlappingSegments { first, second });
                }
            }
        }
        Ok(())
    }
}

/// Bitfield wrapper for `Elf64_Phdr.p_flags` (32-bit)
///
/// Layout (LSB→MSB):
/// - bit 0: execute
/// - bit 1: write
/// - bit 2: read
/// - bits 3..31: reserved (must be zero for standard flags)
#[bitfield_struct::bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PFlags {
    #[bits(1)]
    pub execute: bool,
    #[bits(1)]
    pub write: bool,
    #[bits(1)]
    pub read: bool,
    #[bits(29)]
    __: u32,
}

/// One decoded `Elf64_Phdr`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub flags: PFlags,
    /// Offset of the segment's bytes in the file.
    pub offset: u64,
    /// Destination address. The kernel runs identity-mapped, so this is physical.
    pub vaddr: u64,
    pub paddr: u64,
    pub filesz: u64,
    pub memsz: u64,
    pub align: u64,
}

impl ProgramHeader {
    #[must_use]
    pub fn decode(bytes: &[u8; PROGRAM_HEADER_SIZE]) -> Self {
        Self {
            p_type: le_u32(bytes, P_TYPE),
            flags: PFlags::from_bits(le_u32(bytes, P_FLAGS)),
            offset: le_u64(bytes, P_OFFSET),
            vaddr: le_u64(bytes, P_VADDR),
            paddr: le_u64(bytes, P_PADDR),
            filesz: le_u64(bytes, P_FILESZ),
            memsz: le_u64(bytes, P_MEMSZ),
            align: le_u64(bytes, P_ALIGN),
        }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; PROGRAM_HEADER_SIZE] {
        let mut bytes = [0; PROGRAM_HEADER_SIZE];
        bytes[P_TYPE..P_TYPE + 4].copy_from_slice(&self.p_type.to_le_bytes());
        bytes[P_FLAGS..P_FLAGS + 4].copy_from_slice(&self.flags.into_bits().to_le_bytes());
        for (offset, value) in [
            (P_OFFSET, self.offset),
            (P_VADDR, self.vaddr),
            (P_PADDR, self.paddr),
            (P_FILESZ, self.filesz),
            (P_MEMSZ, self.memsz),
            (P_ALIGN, self.align),
        ] {
            bytes[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    #[must_use]
    pub const fn is_load(&self) -> bool {
        self.p_type == PT_LOAD
    }

    /// Exclusive end of the destination range, `None` if it wraps.
    #[must_use]
    pub const fn end(&self) -> Option<u64> {
        self.vaddr.checked_add(self.memsz)
    }
}

fn le_u16<const N: usize>(bytes: &[u8; N], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn le_u32<const N: usize>(bytes: &[u8; N], offset: usize) -> u32 {
    let mut raw = [0; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64<const N: usize>(bytes: &[u8; N], offset: usize) -> u64 {
    let mut raw = [0; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}
