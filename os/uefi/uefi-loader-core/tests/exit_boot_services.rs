use std::cell::Cell;
use std::collections::VecDeque;

use kernel_info::memory_map::{MemoryAttribute, MemoryDescriptor, MemoryType};
use uefi::Status;
use uefi_loader_core::handoff::{ExitAttempt, exit_and_hand_off, exit_boot_services};
use uefi_loader_core::{BootError, BootFirmware, MemoryMapBuffer, MemoryMapMeta};

/// Firmware whose map key changes on every query and whose `ExitBootServices`
/// results are scripted.
struct ScriptedFirmware {
    next_key: u64,
    exit_results: VecDeque<Result<(), Status>>,
    fail_requery: bool,
    queries: usize,
    exit_keys: Vec<u64>,
}

impl ScriptedFirmware {
    fn new(exit_results: impl IntoIterator<Item = Result<(), Status>>) -> Self {
        Self {
            next_key: 0x100,
            exit_results: exit_results.into_iter().collect(),
            fail_requery: false,
            queries: 0,
            exit_keys: Vec::new(),
        }
    }
}

impl BootFirmware for ScriptedFirmware {
    fn get_memory_map(&mut self, buffer: &mut [u8]) -> Result<MemoryMapMeta, Status> {
        self.queries += 1;
        if self.fail_requery && self.queries > 1 {
            return Err(Status::DEVICE_ERROR);
        }

        let descriptor = MemoryDescriptor {
            memory_type: MemoryType::CONVENTIONAL,
            physical_start: 0x1000 * self.queries as u64,
            virtual_start: 0,
            number_of_pages: 1,
            attribute: MemoryAttribute::new(),
        };
        buffer[..MemoryDescriptor::ENCODED_SIZE].copy_from_slice(&descriptor.encode());

        let map_key = self.next_key;
        self.next_key += 1;
        Ok(MemoryMapMeta {
            map_size: 48,
            map_key,
            descriptor_size: 48,
            descriptor_version: 1,
        })
    }

    fn exit_boot_services(&mut self, map_key: u64) -> Result<(), Status> {
        self.exit_keys.push(map_key);
        self.exit_results
            .pop_front()
            .expect("no further ExitBootServices call expected")
    }
}

/// Records whether boot services have been left.
struct ExitTracking<'a> {
    inner: ScriptedFirmware,
    exited: &'a Cell<bool>,
}

impl BootFirmware for ExitTracking<'_> {
    fn get_memory_map(&mut self, buffer: &mut [u8]) -> Result<MemoryMapMeta, Status> {
        assert!(!self.exited.get(), "memory map queried after exit");
        self.inner.get_memory_map(buffer)
    }

    fn exit_boot_services(&mut self, map_key: u64) -> Result<(), Status> {
        assert!(!self.exited.get(), "boot services left twice");
        let result = self.inner.exit_boot_services(map_key);
        self.exited.set(result.is_ok());
        result
    }
}

#[test]
fn stale_key_is_refreshed_and_retried_once() {
    let mut firmware = ScriptedFirmware::new([Err(Status::INVALID_PARAMETER), Ok(())]);
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");

    // Something allocated in between and invalidated the key.
    let hand_offs = Cell::new(0);
    let handed_key = exit_and_hand_off(&mut firmware, &mut map, |memory_map| {
        hand_offs.set(hand_offs.get() + 1);
        memory_map.map_key
    })
    .expect("retry succeeds");

    assert_eq!(hand_offs.get(), 1);
    assert_eq!(firmware.exit_keys, [0x100, 0x101]);
    assert_eq!(firmware.queries, 2);
    assert_eq!(handed_key, 0x101);
    assert!(firmware.exit_results.is_empty());
}

#[test]
fn handed_off_map_is_the_accepted_snapshot() {
    let mut firmware = ScriptedFirmware::new([Err(Status::INVALID_PARAMETER), Ok(())]);
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");

    let start = exit_and_hand_off(&mut firmware, &mut map, |memory_map| {
        let view = unsafe { memory_map.view() }.expect("valid map");
        view.get(0).map(|d| d.physical_start)
    })
    .expect("retry succeeds");

    assert_eq!(start, Some(0x2000));
}

#[test]
fn first_attempt_success_needs_no_requery() {
    let mut firmware = ScriptedFirmware::new([Ok(())]);
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");

    assert_eq!(
        exit_boot_services(&mut firmware, &mut map),
        Ok(ExitAttempt::First)
    );
    assert_eq!(firmware.queries, 1);
    assert_eq!(firmware.exit_keys, [0x100]);
}

#[test]
fn second_failure_is_fatal_without_third_attempt() {
    let mut firmware = ScriptedFirmware::new([
        Err(Status::INVALID_PARAMETER),
        Err(Status::INVALID_PARAMETER),
    ]);
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");

    let mut called = false;
    let result = exit_and_hand_off(&mut firmware, &mut map, |_| called = true);

    assert_eq!(
        result,
        Err(BootError::ExitBootServices(Status::INVALID_PARAMETER))
    );
    assert!(!called);
    assert_eq!(firmware.exit_keys.len(), 2);
}

#[test]
fn failed_requery_is_fatal() {
    let mut firmware = ScriptedFirmware::new([Err(Status::INVALID_PARAMETER)]);
    firmware.fail_requery = true;
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");

    assert_eq!(
        exit_boot_services(&mut firmware, &mut map),
        Err(BootError::MemoryMap(Status::DEVICE_ERROR))
    );
    assert_eq!(firmware.exit_keys.len(), 1);
}

#[test]
fn hand_off_runs_only_after_boot_services_are_gone() {
    let exited = Cell::new(false);
    let mut firmware = ExitTracking {
        inner: ScriptedFirmware::new([Err(Status::INVALID_PARAMETER), Ok(())]),
        exited: &exited,
    };
    let mut storage = [0u8; 4096];
    let mut map = MemoryMapBuffer::new(&mut storage);
    map.refresh(&mut firmware).expect("initial map");
    assert!(!exited.get());

    let exited_at_hand_off = exit_and_hand_off(&mut firmware, &mut map, |_| exited.get())
        .expect("retry succeeds");

    assert!(exited_at_hand_off);
    assert_eq!(firmware.inner.exit_keys, [0x100, 0x101]);
}
