//! # Kernel synchronization primitives
//!
//! Just enough to share a kernel-global value between contexts that run
//! before any scheduler exists: a one-shot cell that is claimed exactly once
//! and a test-and-test-and-set spin lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;
mod sync_once_cell;

pub use spin_lock::{SpinLock, SpinLockGuard};
pub use sync_once_cell::{InitError, SyncOnceCell};
