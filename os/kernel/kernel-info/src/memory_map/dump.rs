//! # Memory Map Dump Format
//!
//! Human-readable record format used for the diagnostic memory map file:
//!
//! ```text
//! Index, Type, Type(name), PhysicalStart, NumberOfPages, Attribute
//! 0, 3, EfiBootServicesCode, 00000000, 1, f
//! 1, 7, EfiConventionalMemory, 00001000, 9f, f
//! ```
//!
//! Numbers except the index are hexadecimal without prefix. This is a
//! debugging aid, not a stable format.

use super::descriptor::{MemoryAttribute, MemoryDescriptor};
use core::fmt;

/// First line of a dump, terminated by a newline.
pub const DUMP_HEADER: &str = "Index, Type, Type(name), PhysicalStart, NumberOfPages, Attribute\n";

/// One dump record, formatted with a trailing newline.
#[derive(Debug, Copy, Clone)]
pub struct DumpLine<'a> {
    pub index: usize,
    pub descriptor: &'a MemoryDescriptor,
}

impl fmt::Display for DumpLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.descriptor;
        writeln!(
            f,
            "{}, {:x}, {}, {:08x}, {:x}, {:x}",
            self.index,
            d.memory_type.0,
            d.memory_type.name(),
            d.physical_start,
            d.number_of_pages,
            d.attribute.into_bits() & MemoryAttribute::DISPLAY_MASK
        )
    }
}
