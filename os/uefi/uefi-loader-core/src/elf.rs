//! # ELF file handling
//!
//! Only what is needed to place a statically linked x86-64 executable at its
//! link address: the file header, the program header table and `PT_LOAD`
//! segments. No relocation is performed.

mod loader;
mod parser;

pub use loader::{LoadAddressRange, LoadTarget, MemoryWindow, PageSpan};
pub use parser::{ElfImage, PFlags, ProgramHeader};

/// Loadable segment.
pub const PT_LOAD: u32 = 1;

const PAGE_SIZE: u64 = kernel_info::memory::UEFI_PAGE_SIZE;

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum ElfError {
    #[error("The image is smaller than an ELF64 header")]
    TruncatedHeader,
    #[error("The image does not start with the ELF magic")]
    BadMagic,
    #[error("The image is not a 64-bit ELF file")]
    UnsupportedClass,
    #[error("The image is not little-endian")]
    UnsupportedEncoding,
    #[error("Unsupported ELF version")]
    UnsupportedVersion,
    #[error("Unsupported machine type {0}")]
    UnsupportedMachine(u16),
    #[error("ELF type {0} is not an executable")]
    NotExecutable(u16),
    #[error("Unexpected program header entry size {0}")]
    BadProgramHeaderSize(u16),
    #[error("The program header table lies outside the image")]
    ProgramHeadersOutOfBounds,
    #[error("Segment {index} has a memory size below its file size")]
    SegmentSizeMismatch { index: usize },
    #[error("Segment {index} refers to bytes outside the image")]
    SegmentOutOfBounds { index: usize },
    #[error("Segment {index} wraps around the address space")]
    AddressOverflow { index: usize },
    #[error("The image has no loadable segment")]
    NoLoadSegments,
    #[error("Segments {first} and {second} overlap")]
    OverlappingSegments { first: usize, second: usize },
    #[error("Destination {address:#x}+{len:#x} is outside the reserved memory")]
    DestinationOutOfWindow { address: u64, len: u64 },
}
