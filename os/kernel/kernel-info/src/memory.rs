//! # Physical Memory Layout

/// Byte count of `n` kibibytes.
#[must_use]
pub const fn kib(n: u64) -> u64 {
    n * 1024
}

/// Byte count of `n` mebibytes.
#[must_use]
pub const fn mib(n: u64) -> u64 {
    n * kib(1024)
}

/// Byte count of `n` gibibytes.
#[must_use]
pub const fn gib(n: u64) -> u64 {
    n * mib(1024)
}

/// Physical address the kernel image is linked to and loaded at.
///
/// There is no relocation: the loader reserves exactly the pages covered by the
/// kernel's `PT_LOAD` segments, which start here.
///
/// # Kernel Build
/// This information is sourced in the kernel's `build.rs` to configure
/// the linker.
pub const KERNEL_BASE: u64 = 0x0010_0000; // 1 MiB

/// Size of a UEFI page. `NumberOfPages` in a memory descriptor counts these.
pub const UEFI_PAGE_SIZE: u64 = kib(4);

/// Capacity of the loader's memory map buffer.
///
/// The buffer is fixed at compile time; a firmware map that does not fit is a
/// fatal misconfiguration.
#[allow(clippy::cast_possible_truncation)]
pub const MEMORY_MAP_BUFFER_SIZE: usize = kib(16) as usize;

/// Size of the stack the kernel switches to on entry.
#[allow(clippy::cast_possible_truncation)]
pub const KERNEL_STACK_SIZE: usize = kib(32) as usize;

const _: () = {
    assert!(KERNEL_BASE.is_multiple_of(UEFI_PAGE_SIZE));
    assert!(KERNEL_STACK_SIZE.is_multiple_of(16));
    assert!(gib(1) == 1 << 30);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_helpers() {
        assert_eq!(kib(4), 4096);
        assert_eq!(mib(1), 1024 * 1024);
        assert_eq!(gib(128), 128 << 30);
    }

    #[test]
    fn buffer_and_stack_sizes_survive_the_usize_conversion() {
        assert_eq!(MEMORY_MAP_BUFFER_SIZE, 16 * 1024);
        assert_eq!(KERNEL_STACK_SIZE, 32 * 1024);
    }
}
