//! # Memory Map Hand-off
//!
//! [`MemoryMap`] is the firmware memory map snapshot exactly as the loader
//! captured it: a raw byte buffer plus the scalars `GetMemoryMap` reported.
//! The buffer is a contiguous sequence of fixed-stride entries, where the
//! stride is the runtime `descriptor_size`, never `size_of` of any Rust type.
//! Entries are forward-compatible and may carry trailing bytes beyond the
//! fields this crate knows about.
//!
//! [`MemoryMapView`] is the safe, bounds-checked rendition of that buffer and
//! [`Descriptors`] iterates it lazily, decoding one [`MemoryDescriptor`] per
//! stride.
//! [`ByAddress`] visits the same entries in ascending address order, since
//! firmware is not required to report them sorted.

mod descriptor;
pub mod dump;

pub use descriptor::{MemoryAttribute, MemoryDescriptor, MemoryType};

use core::iter::FusedIterator;
use core::mem::{offset_of, size_of};
use core::slice::ChunksExact;

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum MemoryMapError {
    #[error("the memory map buffer is null")]
    NullBuffer,
    #[error(
        "descriptor size {0} is smaller than the {min} byte descriptor",
        min = MemoryDescriptor::ENCODED_SIZE
    )]
    DescriptorTooSmall(u64),
    #[error("map size {map_size} exceeds the buffer size {buffer_size}")]
    MapExceedsBuffer { map_size: u64, buffer_size: u64 },
    #[error("memory map size does not fit the address space")]
    SizeNotRepresentable,
}

/// Memory map handed from the loader to the kernel.
///
/// Keep this `#[repr(C)]`; the kernel receives it by reference. All fields
/// except `descriptor_version` are pointer-sized on the 64-bit target.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryMap {
    /// Capacity of the buffer in bytes.
    pub buffer_size: u64,
    /// Address of the first byte of the buffer.
    pub buffer: u64,
    /// Bytes of the buffer holding descriptors.
    pub map_size: u64,
    /// Token identifying this snapshot.
    pub map_key: u64,
    /// Stride between consecutive descriptors.
    pub descriptor_size: u64,
    pub descriptor_version: u32,
}

const _: () = {
    assert!(offset_of!(MemoryMap, buffer_size) == 0);
    assert!(offset_of!(MemoryMap, buffer) == 8);
    assert!(offset_of!(MemoryMap, map_size) == 16);
    assert!(offset_of!(MemoryMap, map_key) == 24);
    assert!(offset_of!(MemoryMap, descriptor_size) == 32);
    assert!(offset_of!(MemoryMap, descriptor_version) == 40);
    assert!(size_of::<MemoryMap>() == 48);
};

impl MemoryMap {
    /// Borrows the descriptor bytes as a [`MemoryMapView`].
    ///
    /// # Errors
    /// Fails if the buffer is null, the map does not fit the buffer or the
    /// stride is smaller than a descriptor.
    ///
    /// # Safety
    /// `buffer` must point to at least `map_size` initialized bytes that stay
    /// valid and unmodified for `'a`.
    pub unsafe fn view<'a>(&self) -> Result<MemoryMapView<'a>, MemoryMapError> {
        if self.buffer == 0 {
            return Err(MemoryMapError::NullBuffer);
        }
        if self.map_size > self.buffer_size {
            return Err(MemoryMapError::MapExceedsBuffer {
                map_size: self.map_size,
                buffer_size: self.buffer_size,
            });
        }

        let len =
            usize::try_from(self.map_size).map_err(|_| MemoryMapError::SizeNotRepresentable)?;
        let stride = usize::try_from(self.descriptor_size)
            .map_err(|_| MemoryMapError::DescriptorTooSmall(self.descriptor_size))?;

        // SAFETY: the caller guarantees `map_size` readable bytes at `buffer`.
        let bytes = unsafe { core::slice::from_raw_parts(self.buffer as *const u8, len) };
        MemoryMapView::new(bytes, stride)
    }
}

/// Bounds-checked view of a memory map buffer, stamped with the runtime stride.
#[derive(Debug, Copy, Clone)]
pub struct MemoryMapView<'a> {
    bytes: &'a [u8],
    descriptor_size: usize,
}

impl<'a> MemoryMapView<'a> {
    /// Wraps `bytes`, which should hold exactly the `map_size` bytes reported by
    /// the firmware. A trailing partial entry is ignored.
    ///
    /// # Errors
    /// Fails if `descriptor_size` is smaller than
    /// [`MemoryDescriptor::ENCODED_SIZE`].
    pub const fn new(bytes: &'a [u8], descriptor_size: usize) -> Result<Self, MemoryMapError> {
        if descriptor_size < MemoryDescriptor::ENCODED_SIZE {
            return Err(MemoryMapError::DescriptorTooSmall(descriptor_size as u64));
        }
        Ok(Self {
            bytes,
            descriptor_size,
        })
    }

    #[must_use]
    pub const fn descriptor_size(&self) -> usize {
        self.descriptor_size
    }

    /// Number of complete entries, i.e. `map_size / descriptor_size`.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len() / self.descriptor_size
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the entry at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<MemoryDescriptor> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.descriptor_size;
        let entry = self.bytes.get(start..)?.first_chunk()?;
        Some(MemoryDescriptor::decode(entry))
    }

    /// Lazily decodes every entry in order. The iterator is cheap to clone, so
    /// the sequence can be restarted at will.
    #[must_use]
    pub fn iter(&self) -> Descriptors<'a> {
        Descriptors {
            entries: self.bytes.chunks_exact(self.descriptor_size),
        }
    }

    /// Decodes every entry in ascending `physical_start` order.
    ///
    /// Firmware usually reports the map sorted, but UEFI does not promise it.
    /// Entries with equal start addresses keep their map order. Each step
    /// rescans the map, so a full pass is quadratic in the entry count.
    #[must_use]
    pub const fn iter_by_address(&self) -> ByAddress<'a> {
        ByAddress {
            view: *self,
            last: None,
        }
    }

    /// Highest exclusive end address over all entries.
    #[must_use]
    pub fn max_physical_end(&self) -> u64 {
        self.iter()
            .map(|d| d.physical_end())
            .max()
            .unwrap_or_default()
    }
}

impl<'a> IntoIterator for MemoryMapView<'a> {
    type Item = MemoryDescriptor;
    type IntoIter = Descriptors<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &MemoryMapView<'a> {
    type Item = MemoryDescriptor;
    type IntoIter = Descriptors<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the descriptors of a [`MemoryMapView`].
#[derive(Debug, Clone)]
pub struct Descriptors<'a> {
    entries: ChunksExact<'a, u8>,
}

impl Iterator for Descriptors<'_> {
    type Item = MemoryDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        // Every chunk is at least ENCODED_SIZE long, checked in MemoryMapView::new.
        self.entries
            .next()?
            .first_chunk()
            .map(MemoryDescriptor::decode)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Descriptors<'_> {}
impl FusedIterator for Descriptors<'_> {}

/// Iterator over the descriptors of a [`MemoryMapView`] by start address.
#[derive(Debug, Clone)]
pub struct ByAddress<'a> {
    view: MemoryMapView<'a>,
    /// Sort key `(physical_start, index)` of the entry yielded last.
    last: Option<(u64, usize)>,
}

impl Iterator for ByAddress<'_> {
    type Item = MemoryDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, descriptor) = self
            .view
            .iter()
            .enumerate()
            .map(|(index, d)| ((d.physical_start, index), d))
            .filter(|(key, _)| self.last.is_none_or(|last| *key > last))
            .min_by_key(|(key, _)| *key)?;
        self.last = Some(key);
        Some(descriptor)
    }
}

impl FusedIterator for ByAddress<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(memory_type: MemoryType, physical_start: u64, pages: u64) -> MemoryDescriptor {
        MemoryDescriptor {
            memory_type,
            physical_start,
            virtual_start: 0,
            number_of_pages: pages,
            attribute: MemoryAttribute::new().with_wb(true),
        }
    }

    /// Lays out descriptors with `stride` bytes each, filling the surplus with junk.
    fn synthetic_map(entries: &[MemoryDescriptor], stride: usize) -> Vec<u8> {
        let mut bytes = vec![0xA5; entries.len() * stride];
        for (chunk, d) in bytes.chunks_exact_mut(stride).zip(entries) {
            chunk[..MemoryDescriptor::ENCODED_SIZE].copy_from_slice(&d.encode());
        }
        bytes
    }

    #[test]
    fn iterates_by_runtime_stride_not_struct_size() {
        let entries = [
            descriptor(MemoryType::BOOT_SERVICES_CODE, 0, 1),
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 0x9f),
            descriptor(MemoryType::RESERVED, 0xa_0000, 0x60),
            descriptor(MemoryType::LOADER_DATA, 0x10_0000, 0x10),
        ];
        let stride = 48;
        let bytes = synthetic_map(&entries, stride);

        let view = MemoryMapView::new(&bytes, stride).expect("valid stride");
        assert_eq!(view.len(), bytes.len() / stride);
        assert_eq!(view.iter().len(), 4);
        assert!(view.iter().eq(entries.iter().copied()));
        assert_eq!(view.get(2), Some(entries[2]));
        assert_eq!(view.get(4), None);
    }

    #[test]
    fn iteration_is_restartable() {
        let entries = [
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 1),
            descriptor(MemoryType::CONVENTIONAL, 0x2000, 1),
        ];
        let bytes = synthetic_map(&entries, 64);
        let view = MemoryMapView::new(&bytes, 64).expect("valid stride");

        let iter = view.iter();
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
        assert_eq!(view.max_physical_end(), 0x3000);
    }

    #[test]
    fn address_order_sorts_unsorted_maps() {
        let entries = [
            descriptor(MemoryType::CONVENTIONAL, 0x1_0000, 4),
            descriptor(MemoryType::RESERVED, 0, 2),
            descriptor(MemoryType::CONVENTIONAL, 0x2000, 2),
            descriptor(MemoryType::MMIO, 0x2000, 0),
        ];
        let bytes = synthetic_map(&entries, 40);
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");

        let starts: Vec<_> = view
            .iter_by_address()
            .map(|d| (d.physical_start, d.memory_type))
            .collect();
        assert_eq!(
            starts,
            [
                (0, MemoryType::RESERVED),
                (0x2000, MemoryType::CONVENTIONAL),
                (0x2000, MemoryType::MMIO),
                (0x1_0000, MemoryType::CONVENTIONAL),
            ]
        );
        assert!(view.iter().eq(entries.iter().copied()));
    }

    #[test]
    fn address_order_of_an_empty_map_is_empty() {
        let view = MemoryMapView::new(&[], 48).expect("valid stride");
        assert_eq!(view.iter_by_address().next(), None);
    }

    #[test]
    fn trailing_partial_entry_is_ignored() {
        let entries = [descriptor(MemoryType::CONVENTIONAL, 0x1000, 1)];
        let mut bytes = synthetic_map(&entries, 40);
        bytes.extend_from_slice(&[0; 20]);
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");
        assert_eq!(view.len(), 1);
        assert_eq!(view.iter().count(), 1);
    }

    #[test]
    fn rejects_stride_below_descriptor_size() {
        assert_eq!(
            MemoryMapView::new(&[0; 64], 32).unwrap_err(),
            MemoryMapError::DescriptorTooSmall(32)
        );
        assert_eq!(
            MemoryMapView::new(&[], 0).unwrap_err(),
            MemoryMapError::DescriptorTooSmall(0)
        );
    }

    #[test]
    fn hand_off_struct_views_its_buffer() {
        let entries = [
            descriptor(MemoryType::CONVENTIONAL, 0x1000, 2),
            descriptor(MemoryType::MMIO, 0xfee0_0000, 1),
        ];
        let bytes = synthetic_map(&entries, 48);
        let map = MemoryMap {
            buffer_size: bytes.len() as u64 + 100,
            buffer: bytes.as_ptr() as u64,
            map_size: bytes.len() as u64,
            map_key: 7,
            descriptor_size: 48,
            descriptor_version: 1,
        };

        let view = unsafe { map.view() }.expect("valid map");
        assert_eq!(view.len(), 2);
        assert_eq!(view.get(1).map(|d| d.memory_type), Some(MemoryType::MMIO));
    }

    #[test]
    fn hand_off_struct_rejects_inconsistent_sizes() {
        let null = MemoryMap {
            buffer_size: 0,
            buffer: 0,
            map_size: 0,
            map_key: 0,
            descriptor_size: 48,
            descriptor_version: 1,
        };
        assert_eq!(unsafe { null.view() }.unwrap_err(), MemoryMapError::NullBuffer);

        let bytes = [0u8; 80];
        let overflowing = MemoryMap {
            buffer: bytes.as_ptr() as u64,
            buffer_size: 80,
            map_size: 96,
            ..null
        };
        assert_eq!(
            unsafe { overflowing.view() }.unwrap_err(),
            MemoryMapError::MapExceedsBuffer {
                map_size: 96,
                buffer_size: 80
            }
        );
    }
}
