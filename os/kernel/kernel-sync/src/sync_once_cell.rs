use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicU8, Ordering},
};

const UNINIT: u8 = 0;
const INITING: u8 = 1;
const READY: u8 = 2;
/// The initializer ran and failed; the cell stays empty for good.
const FAILED: u8 = 3;

/// Why [`SyncOnceCell::try_init`] did not store a value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitError<E> {
    /// Another caller claimed the cell first. The initializer was not run.
    Claimed,
    /// The initializer ran and returned this error.
    Failed(E),
}

/// A cell written at most once, by whoever claims it first.
///
/// Unlike a lazy cell there is no waiting: losing the race, or calling again
/// after a failed initialization, is reported as [`InitError::Claimed`]. That
/// makes it suitable for values built from resources that can only be handed
/// out once, such as a `&'static mut` to a static buffer.
pub struct SyncOnceCell<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for SyncOnceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncOnceCell<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINIT),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Returns `Some(&T)` once initialization has succeeded.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.state.load(Ordering::Acquire) == READY {
            // SAFETY: READY guarantees the write is done
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    /// Whether some caller has already claimed the cell, successfully or not.
    #[inline]
    #[must_use]
    pub fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) != UNINIT
    }

    /// Claims the cell and stores the value `init` produces.
    ///
    /// `init` runs at most once over the lifetime of the cell.
    ///
    /// # Errors
    /// * [`InitError::Claimed`] if the cell was claimed before; `init` is
    ///   dropped without being called.
    /// * [`InitError::Failed`] if `init` failed. The cell stays claimed.
    pub fn try_init<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<&T, InitError<E>> {
        if self
            .state
            .compare_exchange(UNINIT, INITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(InitError::Claimed);
        }

        match init() {
            Ok(value) => {
                // SAFETY: INITING makes us the only writer.
                let value = unsafe { (*self.value.get()).write(value) };
                // Publish value before marking READY
                self.state.store(READY, Ordering::Release);
                Ok(value)
            }
            Err(e) => {
                self.state.store(FAILED, Ordering::Release);
                Err(InitError::Failed(e))
            }
        }
    }
}

impl<T> Drop for SyncOnceCell<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == READY {
            // SAFETY: READY and exclusive access.
            unsafe { self.value.get_mut().assume_init_drop() }
        }
    }
}

// Safety: shared after READY; initialization is single-writer.
unsafe impl<T: Sync + Send> Sync for SyncOnceCell<T> {}
unsafe impl<T: Send> Send for SyncOnceCell<T> {}
