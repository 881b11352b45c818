use kernel_info::memory::{KERNEL_BASE, UEFI_PAGE_SIZE};
use std::{env, path::PathBuf};

fn main() {
    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");

    // The loader reserves whole pages starting at the first PT_LOAD address
    assert_eq!(
        KERNEL_BASE % UEFI_PAGE_SIZE,
        0,
        "KERNEL_BASE must be 4 KiB aligned (got {KERNEL_BASE:#x})"
    );

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());

    // Provide symbols to the linker script
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_BASE={KERNEL_BASE:#x}");
}
