//! The frame manager instance shared by the whole kernel.

use crate::{AllocError, BitmapMemoryManager, MapLine};
use kernel_info::memory_map::MemoryMapView;
use kernel_sync::{InitError, SpinLock, SyncOnceCell};

/// A [`BitmapMemoryManager`] that is built once and then locked per use.
///
/// Meant for a `static`: [`init`](Self::init) succeeds for exactly one caller,
/// which also guarantees the bitmap storage is taken at most once. Every later
/// access goes through [`with`](Self::with), which serializes callers on a
/// spin lock.
pub struct SharedFrameManager<M> {
    cell: SyncOnceCell<SpinLock<BitmapMemoryManager<M>>>,
}

impl<M> Default for SharedFrameManager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> SharedFrameManager<M> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: SyncOnceCell::new(),
        }
    }

    /// Whether [`init`](Self::init) has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<M> SharedFrameManager<M>
where
    M: AsRef<[MapLine]> + AsMut<[MapLine]>,
{
    /// Builds the manager over the bitmap returned by `storage` and reserves
    /// everything `map` does not describe as available.
    ///
    /// Only the first call does any work. `storage` is not called at all on
    /// later calls, so it may hand out a unique reference to static memory.
    ///
    /// # Errors
    /// * [`AllocError::AlreadyInitialized`] on every call after the first,
    ///   including when the first one failed.
    /// * The error of [`BitmapMemoryManager::init_from_memory_map`].
    pub fn init(
        &self,
        storage: impl FnOnce() -> M,
        map: &MemoryMapView<'_>,
    ) -> Result<(), AllocError> {
        self.cell
            .try_init(|| {
                let mut manager = BitmapMemoryManager::new(storage());
                manager.init_from_memory_map(map)?;
                Ok(SpinLock::new(manager))
            })
            .map(|_| ())
            .map_err(|e| match e {
                InitError::Claimed => AllocError::AlreadyInitialized,
                InitError::Failed(e) => e,
            })
    }

    /// Runs `f` on the manager with the lock held.
    ///
    /// Returns `None` if the manager was never initialized. Calling this again
    /// from inside `f` deadlocks.
    pub fn with<R>(&self, f: impl FnOnce(&mut BitmapMemoryManager<M>) -> R) -> Option<R> {
        self.cell.get().map(|manager| manager.with_lock(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FrameId;
    use kernel_info::memory_map::{MemoryAttribute, MemoryDescriptor, MemoryType};

    fn conventional(physical_start: u64, number_of_pages: u64) -> [u8; 40] {
        let mut entry = [0; 40];
        let d = MemoryDescriptor {
            memory_type: MemoryType::CONVENTIONAL,
            physical_start,
            virtual_start: 0,
            number_of_pages,
            attribute: MemoryAttribute::new(),
        };
        entry[..MemoryDescriptor::ENCODED_SIZE].copy_from_slice(&d.encode());
        entry
    }

    #[test]
    fn unusable_before_init() {
        let shared = SharedFrameManager::<Vec<MapLine>>::new();
        assert!(!shared.is_initialized());
        assert_eq!(shared.with(|m| m.allocate(1)), None);
    }

    #[test]
    fn init_builds_the_manager_from_the_map() {
        let entry = conventional(0, 8);
        let view = MemoryMapView::new(&entry, 40).expect("valid stride");

        let shared = SharedFrameManager::new();
        shared.init(|| vec![0; 1], &view).expect("first init");

        assert!(shared.is_initialized());
        assert_eq!(
            shared.with(|m| m.range()),
            Some((FrameId::new(1), FrameId::new(8)))
        );
        assert_eq!(shared.with(|m| m.allocate(2)), Some(Ok(FrameId::new(1))));
        assert_eq!(shared.with(|m| m.free_frame_count()), Some(5));
    }

    #[test]
    fn second_init_does_not_take_the_storage_again() {
        let entry = conventional(0, 8);
        let view = MemoryMapView::new(&entry, 40).expect("valid stride");
        let shared = SharedFrameManager::new();
        shared.init(|| vec![0; 1], &view).expect("first init");
        assert_eq!(shared.with(|m| m.allocate(3)), Some(Ok(FrameId::new(1))));

        let mut storage_taken = false;
        let second = shared.init(
            || {
                storage_taken = true;
                vec![0; 1]
            },
            &view,
        );

        assert_eq!(second, Err(AllocError::AlreadyInitialized));
        assert!(!storage_taken);
        // The first manager and its allocations are untouched.
        assert_eq!(shared.with(|m| m.free_frame_count()), Some(4));
    }

    #[test]
    fn failed_init_cannot_be_retried() {
        let entry = [0u8; 0];
        let view = MemoryMapView::new(&entry, 40).expect("valid stride");
        let shared = SharedFrameManager::new();

        assert_eq!(
            shared.init(|| vec![0; 1], &view),
            Err(AllocError::IndexOutOfRange { begin: 1, end: 0 })
        );
        assert!(!shared.is_initialized());

        let usable = conventional(0, 8);
        let view = MemoryMapView::new(&usable, 40).expect("valid stride");
        assert_eq!(
            shared.init(|| vec![0; 1], &view),
            Err(AllocError::AlreadyInitialized)
        );
        assert_eq!(shared.with(|m| m.range()), None);
    }
}
