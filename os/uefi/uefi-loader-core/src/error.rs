use crate::elf::ElfError;
use uefi::Status;

/// A boot step that failed. Every variant is fatal.
#[derive(Debug, thiserror::Error, Copy, Clone, PartialEq, Eq)]
pub enum BootError {
    #[error("Failed to get memory map: {0:?}")]
    MemoryMap(Status),
    #[error("Failed to open root directory: {0:?}")]
    RootDirectory(Status),
    #[error("Failed to save memory map: {0:?}")]
    SaveMemoryMap(Status),
    #[error("Failed to open GOP: {0:?}")]
    GraphicsOutput(Status),
    #[error("Unimplemented pixel format: {0}")]
    UnsupportedPixelFormat(&'static str),
    #[error("Failed to read kernel file: {0:?}")]
    KernelFile(Status),
    #[error("Invalid kernel image: {0}")]
    Elf(#[from] ElfError),
    #[error("Failed to allocate pages: {0:?}")]
    AllocatePages(Status),
    #[error("Failed to free pool: {0:?}")]
    FreePool(Status),
    #[error("Could not exit boot services: {0:?}")]
    ExitBootServices(Status),
}

impl BootError {
    /// Raw status code for the diagnostic line.
    #[must_use]
    pub const fn status(&self) -> Status {
        match self {
            Self::MemoryMap(status)
            | Self::RootDirectory(status)
            | Self::SaveMemoryMap(status)
            | Self::GraphicsOutput(status)
            | Self::KernelFile(status)
            | Self::AllocatePages(status)
            | Self::FreePool(status)
            | Self::ExitBootServices(status) => *status,
            Self::UnsupportedPixelFormat(_) => Status::UNSUPPORTED,
            Self::Elf(_) => Status::LOAD_ERROR,
        }
    }
}

impl From<BootError> for Status {
    fn from(value: BootError) -> Self {
        value.status()
    }
}
