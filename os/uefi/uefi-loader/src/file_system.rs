use core::fmt;
use core::ptr::NonNull;
use kernel_info::memory_map::MemoryMapView;
use log::{info, warn};
use uefi::boot::{self, MemoryType};
use uefi::proto::media::file::{
    Directory, File, FileAttribute, FileHandle, FileInfo, FileMode, RegularFile,
};
use uefi::{CStr16, Status};
use uefi_loader_core::memory_map::write_dump;

/// Opens the root directory of the volume this image was loaded from.
///
/// # Errors
/// Returns the [`Status`] of the failed protocol call.
pub fn open_root_dir() -> Result<Directory, Status> {
    let mut sfs = boot::get_image_file_system(boot::image_handle()).map_err(|e| e.status())?;
    sfs.open_volume().map_err(|e| e.status())
}

/// Writes the memory map dump to `path`.
///
/// A file that cannot be opened is skipped; write errors are returned.
///
/// # Errors
/// Returns the [`Status`] of the failed write or flush.
pub fn save_memory_map(
    root: &mut Directory,
    path: &CStr16,
    view: &MemoryMapView<'_>,
) -> Result<(), Status> {
    let file = root
        .open(path, FileMode::CreateReadWrite, FileAttribute::empty())
        .map(FileHandle::into_regular_file);
    let mut file = match file {
        Ok(Some(file)) => file,
        Ok(None) => {
            warn!("{path} is a directory, memory map not saved");
            return Ok(());
        }
        Err(e) => {
            warn!("Failed to open {path}: {:?}", e.status());
            return Ok(());
        }
    };

    let mut writer = FileWriter {
        file: &mut file,
        status: Status::SUCCESS,
    };
    if write_dump(view, &mut writer).is_err() {
        return Err(writer.status);
    }
    file.flush().map_err(|e| e.status())?;

    info!("Memory map saved to {path} ({} entries)", view.len());
    Ok(())
}

/// `fmt::Write` over a file, keeping the firmware status of a failed write.
struct FileWriter<'f> {
    file: &'f mut RegularFile,
    status: Status,
}

impl fmt::Write for FileWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.file.write(s.as_bytes()).map_err(|e| {
            self.status = e.status();
            fmt::Error
        })
    }
}

/// File contents in `LoaderData` pool memory.
///
/// There is no `Drop`: the pool is returned with [`PoolBuffer::free`] so that
/// a failure to release it can be reported.
pub struct PoolBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

impl PoolBuffer {
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` owns `len` initialized bytes until `free`.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Returns the memory to the firmware.
    ///
    /// # Errors
    /// Returns the [`Status`] of `FreePool`.
    pub fn free(self) -> Result<(), Status> {
        // SAFETY: `ptr` came from `allocate_pool` and is not used afterwards.
        unsafe { boot::free_pool(self.ptr) }.map_err(|e| e.status())
    }
}

/// Aligned scratch space for [`FileInfo`], which ends in the file name.
#[repr(C, align(8))]
struct InfoBuffer([u8; 512]);

/// Reads a whole file into pool memory, sized from its [`FileInfo`].
///
/// # Errors
/// Returns the [`Status`] of the failed call, or [`Status::END_OF_FILE`] for
/// a short read.
pub fn read_file(root: &mut Directory, path: &CStr16) -> Result<PoolBuffer, Status> {
    let mut file = root
        .open(path, FileMode::Read, FileAttribute::empty())
        .map_err(|e| e.status())?
        .into_regular_file()
        .ok_or(Status::INVALID_PARAMETER)?;

    let mut info = InfoBuffer([0; 512]);
    let size = file
        .get_info::<FileInfo>(&mut info.0)
        .map_err(|e| e.status())?
        .file_size();
    let size = usize::try_from(size).map_err(|_| Status::BAD_BUFFER_SIZE)?;

    let ptr = boot::allocate_pool(MemoryType::LOADER_DATA, size).map_err(|e| e.status())?;
    let buffer = PoolBuffer { ptr, len: size };

    // SAFETY: the pool holds `size` bytes; `read` fills them.
    let bytes = unsafe { core::slice::from_raw_parts_mut(ptr.as_ptr(), size) };
    let read = match file.read(bytes) {
        Ok(read) => read,
        Err(e) => {
            let _ = buffer.free();
            return Err(e.status());
        }
    };
    if read != size {
        let _ = buffer.free();
        return Err(Status::END_OF_FILE);
    }

    info!("Read {path}: {size} bytes");
    Ok(buffer)
}
