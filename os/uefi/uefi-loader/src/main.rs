//! # UEFI Kernel Loader
//!
//! Loads `\kernel.elf` from the boot volume to its link address, records the
//! frame buffer and the final memory map, leaves boot services and calls the
//! kernel. There is no paging setup: UEFI identity maps all memory and the
//! kernel is linked to run at its physical load address.
//!
//! ## Boot Sequence
//!
//! ```text
//! UEFI Firmware
//!       ↓
//! ┌─────────────────────────────────────────────┐
//! │ 1. GetMemoryMap into a static 16 KiB buffer │
//! │ 2. Open the boot volume, dump \memmap       │
//! │ 3. GOP mode → FrameBufferConfig             │
//! │ 4. Read \kernel.elf into pool memory        │
//! │ 5. Reserve [first, last) page-aligned,      │
//! │    copy PT_LOAD segments, FreePool          │
//! │ 6. ExitBootServices (one retry)             │
//! │ 7. entry(&frame_buffer, &memory_map)        │
//! └─────────────────────────────────────────────┘
//!       ↓
//! Kernel (sysv64, never returns)
//! ```
//!
//! Any failure before the kernel runs prints one diagnostic line naming the
//! step and the raw status, then halts the processor for good.
//!
//! ## Lifetime of the Hand-off Data
//!
//! The memory map lives in a static of this image (`LoaderCode`/`LoaderData`),
//! so it survives `ExitBootServices`. The frame buffer description lives on
//! the loader stack; the kernel copies it before switching stacks.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod file_system;
mod firmware;
mod framebuffer;
mod logger;

use crate::file_system::{open_root_dir, read_file, save_memory_map};
use crate::firmware::UefiFirmware;
use crate::framebuffer::current_gop_mode;
use crate::logger::UefiLogger;
use core::convert::Infallible;
use kernel_info::boot::KernelEntryFn;
use kernel_info::memory::MEMORY_MAP_BUFFER_SIZE;
use log::{LevelFilter, debug, error, info};
use uefi::boot::{self, AllocateType, MemoryType};
use uefi::prelude::*;
use uefi::{CStr16, cstr16};
use uefi_loader_core::elf::{ElfImage, MemoryWindow};
use uefi_loader_core::framebuffer::frame_buffer_config;
use uefi_loader_core::handoff::exit_and_hand_off;
use uefi_loader_core::{BootError, MemoryMapBuffer};

const KERNEL_FILE_PATH: &CStr16 = cstr16!("\\kernel.elf");
const MEMORY_MAP_FILE_PATH: &CStr16 = cstr16!("\\memmap");

static LOGGER: UefiLogger = UefiLogger::new(LevelFilter::Debug);

/// Backing store of the memory map handed to the kernel.
#[repr(C, align(8))]
struct MemoryMapStorage([u8; MEMORY_MAP_BUFFER_SIZE]);

static mut MEMORY_MAP: MemoryMapStorage = MemoryMapStorage([0; MEMORY_MAP_BUFFER_SIZE]);

#[entry]
fn efi_main() -> Status {
    let _ = LOGGER.init();
    info!("UEFI Loader reporting to QEMU");

    match boot_kernel() {
        Ok(never) => match never {},
        Err(e) => {
            error!("{e} (status {:?})", e.status());
            halt()
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn boot_kernel() -> Result<Infallible, BootError> {
    let mut firmware = UefiFirmware::current();

    // SAFETY: the only reference to the static, taken once on the boot path.
    let storage = unsafe { &mut *(&raw mut MEMORY_MAP) };
    let mut map = MemoryMapBuffer::new(&mut storage.0);
    map.refresh(&mut firmware).map_err(BootError::MemoryMap)?;

    let mut root = open_root_dir().map_err(BootError::RootDirectory)?;
    {
        let view = map
            .view()
            .map_err(|_| BootError::MemoryMap(Status::INVALID_PARAMETER))?;
        info!(
            "Memory map: {} descriptors, {} bytes each, key {:#x}",
            view.len(),
            view.descriptor_size(),
            map.map_key()
        );
        save_memory_map(&mut root, MEMORY_MAP_FILE_PATH, &view)
            .map_err(BootError::SaveMemoryMap)?;
    }

    let gop = current_gop_mode().map_err(BootError::GraphicsOutput)?;
    let frame_buffer = frame_buffer_config(&gop)?;

    let kernel_file = read_file(&mut root, KERNEL_FILE_PATH).map_err(BootError::KernelFile)?;
    let entry = load_kernel(kernel_file.as_slice())?;
    kernel_file.free().map_err(BootError::FreePool)?;
    drop(root);

    LOGGER.exit_boot_services();
    exit_and_hand_off(&mut firmware, &mut map, |memory_map| -> Infallible {
        let address = core::ptr::with_exposed_provenance::<()>(entry as usize);
        // SAFETY: `e_entry` of the image just placed at its link address.
        let kernel_entry = unsafe { core::mem::transmute::<*const (), KernelEntryFn>(address) };
        kernel_entry(&raw const frame_buffer, memory_map)
    })
}

/// Places the kernel's `PT_LOAD` segments and returns its entry address.
fn load_kernel(bytes: &[u8]) -> Result<u64, BootError> {
    let elf = ElfImage::parse(bytes)?;
    let range = elf.calc_load_address_range();
    let span = range.page_span()?;
    info!(
        "Kernel: {:#x} - {:#x} ({} pages), entry {:#x}",
        range.first,
        range.last,
        span.pages,
        elf.entry()
    );

    boot::allocate_pages(
        AllocateType::Address(span.start),
        MemoryType::LOADER_DATA,
        span.pages,
    )
    .map_err(|e| BootError::AllocatePages(e.status()))?;

    // SAFETY: the span was just reserved and UEFI identity maps memory.
    let mut window = unsafe { MemoryWindow::from_span(span) };
    elf.copy_load_segments(&mut window)?;
    debug!("Kernel segments copied");

    Ok(elf.entry())
}

/// Stops the processor for good.
fn halt() -> ! {
    loop {
        // SAFETY: `hlt` has no memory effects.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }
}
