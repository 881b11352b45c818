use crate::{BITMAP_LINES, BITS_PER_MAP_LINE, BYTES_PER_FRAME, FrameId};

/// One word of the allocation bitmap.
pub type MapLine = u64;

/// Bitmap storage covering the full physical memory ceiling.
pub type Bitmap = [MapLine; BITMAP_LINES];

#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("no contiguous run of {requested} free frames")]
    NoEnoughMemory { requested: usize },
    #[error("frame range {begin}..{end} is invalid for this bitmap")]
    IndexOutOfRange { begin: usize, end: usize },
    #[error("requested zero frames")]
    EmptyRequest,
    #[error("frame manager is already initialized")]
    AlreadyInitialized,
}

/// First-fit physical frame allocator over a bitmap, one bit per frame.
///
/// A set bit means allocated. Searches are confined to the frame range
/// `range_begin..range_end`, which starts out as the whole bitmap and is
/// narrowed to the frames actually backed by RAM with
/// [`set_memory_range`](Self::set_memory_range).
///
/// The storage `M` is provided by the caller, e.g. `&'static mut Bitmap` in the
/// kernel or a small `Vec<MapLine>` in tests.
pub struct BitmapMemoryManager<M> {
    lines: M,
    range_begin: FrameId,
    range_end: FrameId,
}

impl<M> BitmapMemoryManager<M>
where
    M: AsRef<[MapLine]> + AsMut<[MapLine]>,
{
    /// Takes ownership of `lines`, marks every frame free and opens the search
    /// range over the whole bitmap.
    #[must_use]
    pub fn new(mut lines: M) -> Self {
        lines.as_mut().fill(0);
        let capacity = lines.as_ref().len() * BITS_PER_MAP_LINE;
        Self {
            lines,
            range_begin: FrameId::new(0),
            range_end: FrameId::new(capacity),
        }
    }

    /// Number of frames the bitmap can describe.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.lines.as_ref().len() * BITS_PER_MAP_LINE
    }

    /// Allocates `num_frames` contiguous frames, lowest address first.
    ///
    /// When a candidate run hits an allocated frame at offset `i`, the search
    /// resumes at `start + i + 1`: no frame of the failed run can start a free
    /// run that also covers the allocated one.
    ///
    /// # Errors
    /// * [`AllocError::EmptyRequest`] if `num_frames` is zero.
    /// * [`AllocError::NoEnoughMemory`] if no free run fits into the range. The
    ///   bitmap is left untouched.
    pub fn allocate(&mut self, num_frames: usize) -> Result<FrameId, AllocError> {
        if num_frames == 0 {
            return Err(AllocError::EmptyRequest);
        }

        let end = self.range_end.id();
        let mut start = self.range_begin.id();
        loop {
            let mut i = 0;
            while i < num_frames {
                if start + i >= end {
                    return Err(AllocError::NoEnoughMemory {
                        requested: num_frames,
                    });
                }
                if self.bit(start + i) {
                    break;
                }
                i += 1;
            }

            if i == num_frames {
                let frame = FrameId::new(start);
                self.mark_allocated(frame, num_frames);
                return Ok(frame);
            }

            start += i + 1;
        }
    }

    /// Marks `num_frames` frames starting at `start` free.
    ///
    /// Freeing free frames is a no-op. Frames beyond the bitmap are ignored.
    pub fn free(&mut self, start: FrameId, num_frames: usize) {
        self.set_bits(start, num_frames, false);
    }

    /// Marks `num_frames` frames starting at `start` allocated without searching.
    ///
    /// Used to reserve memory that was consumed before the manager existed.
    /// Frames beyond the bitmap are ignored.
    pub fn mark_allocated(&mut self, start: FrameId, num_frames: usize) {
        self.set_bits(start, num_frames, true);
    }

    /// Restricts future searches to `range_begin..range_end`.
    ///
    /// # Errors
    /// [`AllocError::IndexOutOfRange`] if the range is inverted or exceeds the
    /// bitmap capacity. The previous range stays in effect.
    pub fn set_memory_range(
        &mut self,
        range_begin: FrameId,
        range_end: FrameId,
    ) -> Result<(), AllocError> {
        if range_begin > range_end || range_end.id() > self.capacity() {
            return Err(AllocError::IndexOutOfRange {
                begin: range_begin.id(),
                end: range_end.id(),
            });
        }
        self.range_begin = range_begin;
        self.range_end = range_end;
        Ok(())
    }

    /// Current search range, end exclusive.
    #[must_use]
    pub const fn range(&self) -> (FrameId, FrameId) {
        (self.range_begin, self.range_end)
    }

    /// Whether `frame` is allocated. Frames beyond the bitmap count as allocated.
    #[must_use]
    pub fn is_allocated(&self, frame: FrameId) -> bool {
        frame.id() >= self.capacity() || self.bit(frame.id())
    }

    /// Free frames inside the search range.
    #[must_use]
    pub fn free_frame_count(&self) -> usize {
        let lines = self.lines.as_ref();
        let used: u32 = spans(self.range_begin.id(), self.range_end.id())
            .map(|(line, mask)| (lines[line] & mask).count_ones())
            .sum();
        self.range_end.id() - self.range_begin.id() - used as usize
    }

    /// Bytes of physical memory covered by the search range.
    #[must_use]
    pub const fn manageable_size(&self) -> u64 {
        (self.range_end.id() - self.range_begin.id()) as u64 * BYTES_PER_FRAME
    }

    fn bit(&self, frame: usize) -> bool {
        let line = self.lines.as_ref()[frame / BITS_PER_MAP_LINE];
        line & (1 << (frame % BITS_PER_MAP_LINE)) != 0
    }

    fn set_bits(&mut self, start: FrameId, num_frames: usize, allocated: bool) {
        let capacity = self.capacity();
        let begin = start.id().min(capacity);
        let end = start.id().saturating_add(num_frames).min(capacity);

        let lines = self.lines.as_mut();
        for (line, mask) in spans(begin, end) {
            if allocated {
                lines[line] |= mask;
            } else {
                lines[line] &= !mask;
            }
        }
    }
}

/// Splits the frame range `begin..end` into `(line index, bit mask)` pairs.
fn spans(begin: usize, end: usize) -> impl Iterator<Item = (usize, MapLine)> {
    let mut frame = begin;
    core::iter::from_fn(move || {
        if frame >= end {
            return None;
        }
        let line = frame / BITS_PER_MAP_LINE;
        let bit = frame % BITS_PER_MAP_LINE;
        let span = (BITS_PER_MAP_LINE - bit).min(end - frame);
        let mask = if span == BITS_PER_MAP_LINE {
            MapLine::MAX
        } else {
            ((1 << span) - 1) << bit
        };
        frame += span;
        Some((line, mask))
    })
}
