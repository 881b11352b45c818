//! Bootstrapping the frame allocator from the firmware memory map.

use crate::{AllocError, BYTES_PER_FRAME, BitmapMemoryManager, FrameId, MapLine};
use kernel_info::memory_map::MemoryMapView;

impl<M> BitmapMemoryManager<M>
where
    M: AsRef<[MapLine]> + AsMut<[MapLine]>,
{
    /// Reserves every frame the kernel may not hand out and narrows the search
    /// range to the RAM described by `map`.
    ///
    /// Descriptors are walked in ascending address order, whatever order the
    /// firmware reported them in. Holes between the end of the last available
    /// region and the next descriptor, and all descriptors of a non-available
    /// type, are marked allocated. The search range becomes
    /// `1..end_of_last_available_region`, clamped to the bitmap capacity;
    /// frame 0 is never handed out.
    ///
    /// The kernel image, the hand-off structures and the bitmap itself live in
    /// loader memory, which is non-available, so they are covered implicitly.
    ///
    /// # Errors
    /// [`AllocError::IndexOutOfRange`] if the map describes no available memory
    /// above frame 0.
    pub fn init_from_memory_map(&mut self, map: &MemoryMapView<'_>) -> Result<(), AllocError> {
        let mut available_end = 0;
        for descriptor in map.iter_by_address() {
            if available_end < descriptor.physical_start {
                self.mark_allocated(
                    FrameId::containing(available_end),
                    frames(descriptor.physical_start - available_end),
                );
            }

            if descriptor.is_available() {
                available_end = available_end.max(descriptor.physical_end());
            } else {
                self.mark_allocated(
                    FrameId::containing(descriptor.physical_start),
                    frames(descriptor.size_in_bytes()),
                );
            }
        }

        let end = FrameId::containing(available_end)
            .id()
            .min(self.capacity());
        self.set_memory_range(FrameId::new(1), FrameId::new(end))?;

        log::debug!(
            "Managing {} frames ({} MiB) up to {:#x}, {} free",
            end - 1,
            self.manageable_size() / (1024 * 1024),
            available_end,
            self.free_frame_count()
        );
        Ok(())
    }
}

/// Whole frames in `bytes`, saturating on hosts where `usize` is narrower.
fn frames(bytes: u64) -> usize {
    usize::try_from(bytes / BYTES_PER_FRAME).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_info::memory_map::{MemoryAttribute, MemoryDescriptor, MemoryType};

    fn encode(entries: &[(MemoryType, u64, u64)], stride: usize) -> Vec<u8> {
        let mut bytes = vec![0; entries.len() * stride];
        for (chunk, &(memory_type, physical_start, number_of_pages)) in
            bytes.chunks_exact_mut(stride).zip(entries)
        {
            let d = MemoryDescriptor {
                memory_type,
                physical_start,
                virtual_start: 0,
                number_of_pages,
                attribute: MemoryAttribute::new(),
            };
            chunk[..MemoryDescriptor::ENCODED_SIZE].copy_from_slice(&d.encode());
        }
        bytes
    }

    #[test]
    fn reserves_gaps_and_unavailable_regions() {
        let bytes = encode(
            &[
                (MemoryType::BOOT_SERVICES_CODE, 0x0000, 2),
                (MemoryType::RESERVED, 0x2000, 1),
                // hole at 0x3000..0x5000
                (MemoryType::CONVENTIONAL, 0x5000, 3),
                (MemoryType::LOADER_DATA, 0x8000, 2),
                (MemoryType::BOOT_SERVICES_DATA, 0xA000, 6),
            ],
            48,
        );
        let view = MemoryMapView::new(&bytes, 48).expect("valid stride");

        let mut m = BitmapMemoryManager::new(vec![0; 1]);
        m.init_from_memory_map(&view).expect("available memory");

        assert_eq!(m.range(), (FrameId::new(1), FrameId::new(16)));
        let allocated: Vec<usize> = (0..16)
            .filter(|&f| m.is_allocated(FrameId::new(f)))
            .collect();
        assert_eq!(allocated, [2, 3, 4, 8, 9]);
        assert_eq!(m.free_frame_count(), 10);
    }

    #[test]
    fn trailing_reserved_regions_do_not_extend_the_range() {
        let bytes = encode(
            &[
                (MemoryType::CONVENTIONAL, 0x1000, 4),
                (MemoryType::MMIO, 0x10_0000, 0x100),
            ],
            40,
        );
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");

        let mut m = BitmapMemoryManager::new(vec![0; 8]);
        m.init_from_memory_map(&view).expect("available memory");

        assert_eq!(m.range(), (FrameId::new(1), FrameId::new(5)));
        assert!(m.is_allocated(FrameId::new(0)));
        assert_eq!(m.allocate(4), Ok(FrameId::new(1)));
    }

    #[test]
    fn unsorted_map_is_walked_by_address() {
        let bytes = encode(
            &[
                (MemoryType::CONVENTIONAL, 0x1_0000, 4),
                (MemoryType::RESERVED, 0x0000, 2),
                (MemoryType::CONVENTIONAL, 0x2000, 2),
            ],
            40,
        );
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");

        let mut m = BitmapMemoryManager::new(vec![0; 1]);
        m.init_from_memory_map(&view).expect("available memory");

        assert_eq!(m.range(), (FrameId::new(1), FrameId::new(0x14)));
        let allocated: Vec<usize> = (0..0x14)
            .filter(|&f| m.is_allocated(FrameId::new(f)))
            .collect();
        assert_eq!(allocated, [0, 1, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(m.free_frame_count(), 6);
        assert_eq!(m.allocate(2), Ok(FrameId::new(2)));
        assert_eq!(m.allocate(4), Ok(FrameId::new(0x10)));
    }

    #[test]
    fn memory_above_the_bitmap_is_ignored() {
        let bytes = encode(&[(MemoryType::CONVENTIONAL, 0, 1000)], 40);
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");

        let mut m = BitmapMemoryManager::new(vec![0; 2]);
        m.init_from_memory_map(&view).expect("available memory");
        assert_eq!(m.range(), (FrameId::new(1), FrameId::new(128)));
    }

    #[test]
    fn map_without_available_memory_is_an_error() {
        let bytes = encode(&[(MemoryType::RESERVED, 0, 16)], 40);
        let view = MemoryMapView::new(&bytes, 40).expect("valid stride");

        let mut m = BitmapMemoryManager::new(vec![0; 1]);
        assert_eq!(
            m.init_from_memory_map(&view),
            Err(AllocError::IndexOutOfRange { begin: 1, end: 0 })
        );
    }
}
