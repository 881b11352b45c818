//! # Exit Boot Services Handshake
//!
//! `ExitBootServices` only succeeds with the key of the current memory map.
//! Every firmware call that allocates or frees memory invalidates the key, so
//! a failed first attempt is followed by exactly one re-query and one retry.
//! A second failure is fatal.

use crate::memory_map::{BootFirmware, MemoryMapBuffer};
use crate::BootError;
use kernel_info::memory_map::MemoryMap;
use log::{info, warn};

/// Which attempt of the handshake succeeded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExitAttempt {
    First,
    Retry,
}

/// Leaves boot services using the key in `map`, refreshing it once on failure.
///
/// On success `map` holds the snapshot whose key was accepted.
///
/// # Errors
/// * [`BootError::MemoryMap`] if the re-query fails.
/// * [`BootError::ExitBootServices`] if the retry fails as well.
pub fn exit_boot_services<F>(
    firmware: &mut F,
    map: &mut MemoryMapBuffer<'_>,
) -> Result<ExitAttempt, BootError>
where
    F: BootFirmware + ?Sized,
{
    let Err(status) = firmware.exit_boot_services(map.map_key()) else {
        return Ok(ExitAttempt::First);
    };

    warn!("ExitBootServices rejected key {:#x}: {status:?}", map.map_key());
    map.refresh(firmware).map_err(BootError::MemoryMap)?;
    firmware
        .exit_boot_services(map.map_key())
        .map_err(BootError::ExitBootServices)?;
    Ok(ExitAttempt::Retry)
}

/// Runs the handshake, then calls `hand_off` exactly once with the final map.
///
/// In the loader `hand_off` jumps into the kernel and never returns.
///
/// # Boot Services
/// `hand_off` runs after boot services are gone. It must not panic, allocate
/// through the firmware or write to the UEFI console; the loader disables its
/// console logger before calling this.
///
/// # Errors
/// See [`exit_boot_services`]. `hand_off` is not called on error.
pub fn exit_and_hand_off<F, R>(
    firmware: &mut F,
    map: &mut MemoryMapBuffer<'_>,
    hand_off: impl FnOnce(&MemoryMap) -> R,
) -> Result<R, BootError>
where
    F: BootFirmware + ?Sized,
{
    let attempt = exit_boot_services(firmware, map)?;
    info!(
        "Boot services exited ({attempt:?} attempt), map key {:#x}",
        map.map_key()
    );

    let memory_map = map.to_handoff();
    Ok(hand_off(&memory_map))
}
