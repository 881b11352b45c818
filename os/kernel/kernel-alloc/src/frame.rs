use crate::BYTES_PER_FRAME;
use core::fmt;

/// Index of a physical frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FrameId(usize);

/// "No frame" sentinel for callers that store frame IDs without an `Option`.
pub const NULL_FRAME: FrameId = FrameId(usize::MAX);

impl FrameId {
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    /// Frame containing the physical address `address`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn containing(address: u64) -> Self {
        Self((address / BYTES_PER_FRAME) as usize)
    }

    #[must_use]
    pub const fn id(self) -> usize {
        self.0
    }

    /// Physical address of the first byte of the frame.
    ///
    /// Meaningless for [`NULL_FRAME`].
    #[must_use]
    pub const fn address(self) -> u64 {
        (self.0 as u64).wrapping_mul(BYTES_PER_FRAME)
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_FRAME.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("frame(null)")
        } else {
            write!(f, "frame {} @ {:#x}", self.0, self.address())
        }
    }
}
