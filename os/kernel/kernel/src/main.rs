//! # Kernel Entry
//!
//! The UEFI loader copies this image to [`KERNEL_BASE`](kernel_info::memory::KERNEL_BASE)
//! and calls [`_start_kernel`] after `ExitBootServices`, passing the frame
//! buffer description and the final firmware memory map.
//!
//! ```text
//! loader ──sysv64──▶ _start_kernel (naked, own stack)
//!                          │
//!                          ▼
//!                     kernel_main
//!                       • copy hand-off data
//!                       • QEMU logger
//!                       • paint the frame buffer
//!                       • frame allocator from the memory map
//!                       • halt
//! ```
//!
//! Everything the loader handed over lives in loader memory. The memory map
//! buffer is `LoaderData` and therefore reserved by the allocator; the frame
//! buffer description lives on the loader stack, which is reclaimable, so it
//! is copied before anything else runs.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

mod framebuffer;
mod memory;

use crate::framebuffer::fill_solid;
use kernel_info::framebuffer::FrameBufferConfig;
use kernel_info::memory::KERNEL_STACK_SIZE;
use kernel_info::memory_map::MemoryMap;
use kernel_qemu::QemuLogger;
use log::{LevelFilter, debug, error, info, warn};

static LOGGER: QemuLogger = QemuLogger::new(LevelFilter::Debug);

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    error!("{info}");
    halt()
}

/// 16-byte aligned stack
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<KERNEL_STACK_SIZE> = Aligned([0; KERNEL_STACK_SIZE]);

/// The kernel entry point
///
/// # UEFI Interaction
/// The UEFI loader calls this after `ExitBootServices` through
/// [`KernelEntryFn`](kernel_info::boot::KernelEntryFn).
///
/// # ABI
/// `sysv64`: `frame_buffer` arrives in `RDI`, `memory_map` in `RSI`. Neither
/// register is touched before [`kernel_main`] is entered.
///
/// # Naked function & Stack
/// The loader's stack lives in boot services memory, which the kernel may
/// reuse. This switches to [`BOOT_STACK`] before any Rust code runs, so the
/// function must be naked.
#[unsafe(no_mangle)]
#[unsafe(naked)]
#[unsafe(link_section = ".text._start_kernel")]
pub extern "sysv64" fn _start_kernel(
    _frame_buffer: *const FrameBufferConfig,
    _memory_map: *const MemoryMap,
) -> ! {
    core::arch::naked_asm!(
        "lea rax, [rip + {stack_sym}]",
        "add rax, {stack_size}",
        // Align down to 16
        "and rax, -16",
        "mov rsp, rax",
        "xor rbp, rbp",
        // CALL leaves RSP % 16 == 8 at entry, as the ABI expects
        "call {rust_entry}",
        "2:",
        "hlt",
        "jmp 2b",
        stack_sym = sym BOOT_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        rust_entry = sym kernel_main,
    );
}

extern "sysv64" fn kernel_main(
    frame_buffer: *const FrameBufferConfig,
    memory_map: *const MemoryMap,
) -> ! {
    // SAFETY: the loader passes valid pointers and nothing has reused its
    // memory yet.
    let (frame_buffer, memory_map) = unsafe { (*frame_buffer, *memory_map) };

    let _ = LOGGER.init();
    info!("Kernel reporting to QEMU");
    info!(
        "Frame buffer at {:#x}: {}x{}, {}",
        frame_buffer.frame_buffer,
        frame_buffer.horizontal_resolution,
        frame_buffer.vertical_resolution,
        frame_buffer.pixel_format
    );

    // SAFETY: the frame buffer is identity mapped and owned by the kernel.
    unsafe { fill_solid(&frame_buffer, 255, 255, 255) };

    // SAFETY: the map buffer is loader data, which the allocator never hands out.
    match unsafe { memory::init(&memory_map) } {
        Ok(()) => report_frame_allocator(),
        Err(e) => error!("Failed to initialize the frame allocator: {e}"),
    }

    halt()
}

/// Logs the managed range and takes one frame out and back in.
fn report_frame_allocator() {
    let _ = memory::with_frame_manager(|manager| {
        let (begin, end) = manager.range();
        info!(
            "Frame allocator ready: frames {begin}..{end}, {} free",
            manager.free_frame_count()
        );

        match manager.allocate(1) {
            Ok(frame) => {
                debug!("Allocated frame {frame} at {:#x}", frame.address());
                manager.free(frame, 1);
            }
            Err(e) => warn!("Frame allocation failed: {e}"),
        }
    });
}

/// Stops the processor for good.
fn halt() -> ! {
    loop {
        // SAFETY: `hlt` has no memory effects.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) }
    }
}
