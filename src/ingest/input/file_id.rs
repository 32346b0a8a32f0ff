// SPDX-License-Identifier: Apache-2.0

//! Identity of the file behind a log path.
//!
//! Rotation renames `access.log` away and starts a fresh file under the same
//! name. Paths cannot tell the two apart; `(dev, ino)` on Unix, or the volume
//! serial and file index on Windows, can.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// Rotation-stable identity of a log file, persisted in the progress state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Identity of an already opened file.
    ///
    /// Taking the identity from the handle that is then read avoids racing a
    /// rotation between `stat` and `open`.
    pub fn from_file(file: &File) -> io::Result<Self> {
        let (dev, ino) = os_identity(file)?;
        Ok(Self { dev, ino })
    }

    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_file(&File::open(path)?)
    }

    pub fn dev(&self) -> u64 {
        self.dev
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Compare inode numbers only, ignoring the device.
    ///
    /// The legacy state format recorded a bare inode, so it can only be
    /// matched this way.
    pub fn same_inode(&self, other: &FileId) -> bool {
        self.ino == other.ino
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}

#[cfg(unix)]
fn os_identity(file: &File) -> io::Result<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;

    let meta = file.metadata()?;
    Ok((meta.dev(), meta.ino()))
}

#[cfg(windows)]
fn os_identity(file: &File) -> io::Result<(u64, u64)> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::HANDLE;
    use windows_sys::Win32::Storage::FileSystem::{
        BY_HANDLE_FILE_INFORMATION, GetFileInformationByHandle,
    };

    let mut info: BY_HANDLE_FILE_INFORMATION = unsafe { std::mem::zeroed() };
    if unsafe { GetFileInformationByHandle(file.as_raw_handle() as HANDLE, &mut info) } == 0 {
        return Err(io::Error::last_os_error());
    }

    let index = (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow);
    Ok((u64::from(info.dwVolumeSerialNumber), index))
}
