//! # ELF Segment Loader

use super::{ElfError, ElfImage, PAGE_SIZE};
use log::debug;

/// Address range covered by all `PT_LOAD` segments, `last` exclusive.
///
/// Computed by folding from `first = u64::MAX` and `last = 0`, so an image
/// without loadable segments produces an inverted range.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoadAddressRange {
    pub first: u64,
    pub last: u64,
}

impl LoadAddressRange {
    const EMPTY: Self = Self {
        first: u64::MAX,
        last: 0,
    };

    /// `first > last`: no segment contributed.
    #[must_use]
    pub const fn is_inverted(&self) -> bool {
        self.first > self.last
    }

    /// The range widened to whole pages.
    ///
    /// # Errors
    /// * [`ElfError::NoLoadSegments`] for an inverted range.
    /// * [`ElfError::DestinationOutOfWindow`] if rounding up overflows.
    pub fn page_span(&self) -> Result<PageSpan, ElfError> {
        if self.is_inverted() {
            return Err(ElfError::NoLoadSegments);
        }

        let start = self.first & !(PAGE_SIZE - 1);
        let end = self
            .last
            .checked_next_multiple_of(PAGE_SIZE)
            .ok_or(ElfError::DestinationOutOfWindow {
                address: self.first,
                len: self.last - self.first,
            })?;
        let pages = usize::try_from((end - start) / PAGE_SIZE).map_err(|_| {
            ElfError::DestinationOutOfWindow {
                address: start,
                len: end - start,
            }
        })?;
        Ok(PageSpan { start, pages })
    }
}

/// Page-aligned physical memory to reserve for the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageSpan {
    pub start: u64,
    pub pages: usize,
}

impl PageSpan {
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.pages as u64 * PAGE_SIZE
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages == 0
    }

    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.len()
    }
}

/// Destination memory for segment copies.
pub trait LoadTarget {
    /// Writable bytes for the absolute range `address..address + len`.
    ///
    /// # Errors
    /// [`ElfError::DestinationOutOfWindow`] if the range was not reserved.
    fn destination(&mut self, address: u64, len: usize) -> Result<&mut [u8], ElfError>;
}

/// A byte window placed at a fixed address.
#[derive(Debug)]
pub struct MemoryWindow<'a> {
    base: u64,
    bytes: &'a mut [u8],
}

impl<'a> MemoryWindow<'a> {
    /// Places `bytes` at `base`.
    #[must_use]
    pub const fn new(base: u64, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Window over the identity-mapped physical memory of `span`.
    ///
    /// # Safety
    /// `span` must be reserved for the caller, identity mapped and not
    /// otherwise referenced for `'a`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub unsafe fn from_span(span: PageSpan) -> Self {
        // SAFETY: the caller owns the identity-mapped span.
        let bytes = unsafe {
            core::slice::from_raw_parts_mut(span.start as *mut u8, span.len() as usize)
        };
        Self::new(span.start, bytes)
    }
}

impl LoadTarget for MemoryWindow<'_> {
    fn destination(&mut self, address: u64, len: usize) -> Result<&mut [u8], ElfError> {
        let out_of_window = ElfError::DestinationOutOfWindow {
            address,
            len: len as u64,
        };
        let offset = address
            .checked_sub(self.base)
            .and_then(|offset| usize::try_from(offset).ok())
            .ok_or(out_of_window)?;
        let end = offset.checked_add(len).ok_or(out_of_window)?;
        self.bytes.get_mut(offset..end).ok_or(out_of_window)
    }
}

impl ElfImage<'_> {
    /// Folds all `PT_LOAD` segments into `first = min(p_vaddr)` and
    /// `last = max(p_vaddr + p_memsz)`.
    #[must_use]
    pub fn calc_load_address_range(&self) -> LoadAddressRange {
        self.load_segments()
            .fold(LoadAddressRange::EMPTY, |range, (_, ph)| LoadAddressRange {
                first: range.first.min(ph.vaddr),
                last: range.last.max(ph.vaddr.saturating_add(ph.memsz)),
            })
    }

    /// Copies `p_filesz` bytes of every `PT_LOAD` segment to `p_vaddr` and
    /// zero-fills the remaining `p_memsz - p_filesz` bytes.
    ///
    /// # Errors
    /// [`ElfError::DestinationOutOfWindow`] if `target` does not cover a segment.
    pub fn copy_load_segments<T>(&self, target: &mut T) -> Result<(), ElfError>
    where
        T: LoadTarget + ?Sized,
    {
        for (index, ph) in self.load_segments() {
            let offset =
                usize::try_from(ph.offset).map_err(|_| ElfError::SegmentOutOfBounds { index })?;
            let filesz =
                usize::try_from(ph.filesz).map_err(|_| ElfError::SegmentOutOfBounds { index })?;
            let memsz =
                usize::try_from(ph.memsz).map_err(|_| ElfError::AddressOverflow { index })?;

            let source = self
                .bytes()
                .get(offset..offset + filesz)
                .ok_or(ElfError::SegmentOutOfBounds { index })?;
            let destination = target.destination(ph.vaddr, memsz)?;
            let (file, zero) = destination
                .split_at_mut_checked(filesz)
                .ok_or(ElfError::SegmentSizeMismatch { index })?;
            file.copy_from_slice(source);
            zero.fill(0);

            debug!(
                "Segment {index}: {:#x}..{:#x} ({:#x} file, {:#x} zero) {}{}{}",
                ph.vaddr,
                ph.vaddr + ph.memsz,
                ph.filesz,
                ph.memsz - ph.filesz,
                if ph.flags.read() { 'R' } else { '-' },
                if ph.flags.write() { 'W' } else { '-' },
                if ph.flags.execute() { 'X' } else { '-' },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::parser::tests::{image, load};

    #[test]
    fn range_of_two_segments() {
        let bytes = image(
            0x1000,
            &[load(0, 0x1000, 0, 0x500), load(0, 0x2000, 0, 0x1000)],
            &[],
        );
        let elf = ElfImage::parse(&bytes).expect("valid image");
        let range = elf.calc_load_address_range();
        assert_eq!(
            range,
            LoadAddressRange {
                first: 0x1000,
                last: 0x3000
            }
        );
        assert_eq!(
            range.page_span(),
            Ok(PageSpan {
                start: 0x1000,
                pages: 2
            })
        );
    }

    #[test]
    fn no_load_segments_is_inverted() {
        let bytes = image(0, &[], &[]);
        let elf = ElfImage::parse(&bytes).expect("valid image");
        let range = elf.calc_load_address_range();
        assert!(range.is_inverted());
        assert_eq!(range.page_span(), Err(ElfError::NoLoadSegments));
    }

    #[test]
    fn page_span_rounds_outwards() {
        let range = LoadAddressRange {
            first: 0x10_0123,
            last: 0x10_2001,
        };
        let span = range.page_span().expect("valid range");
        assert_eq!(span.start, 0x10_0000);
        assert_eq!(span.pages, 3);
        assert_eq!(span.end(), 0x10_3000);
    }

    #[test]
    fn window_bounds_are_enforced() {
        let mut backing = [0u8; 0x100];
        let mut window = MemoryWindow::new(0x4000, &mut backing);
        assert_eq!(window.destination(0x4080, 0x80).map(|d| d.len()), Ok(0x80));
        assert_eq!(
            window.destination(0x4081, 0x80).map(|d| d.len()),
            Err(ElfError::DestinationOutOfWindow {
                address: 0x4081,
                len: 0x80
            })
        );
        assert!(window.destination(0x3fff, 1).is_err());
    }
}
