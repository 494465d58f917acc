//! Raw volume handles for the modified file cache flush

use std::ffi::c_void;
use windows::core::HSTRING;
use windows::Win32::Foundation::{GENERIC_READ, GENERIC_WRITE, HANDLE};
use windows::Win32::Storage::FileSystem::{
    CreateFileW, FlushFileBuffers, GetDriveTypeW, GetLogicalDrives, FILE_FLAG_NO_BUFFERING,
    FILE_SHARE_READ, FILE_SHARE_WRITE, OPEN_EXISTING,
};
use windows::Win32::System::IO::DeviceIoControl;

use super::ffi::{fsctl, DRIVE_FIXED};
use super::handle::OwnedHandle;
use crate::platform::{PlatformResult, VolumeHandle};

/// Roots (`C:\`) of every fixed drive.
pub fn fixed_volumes() -> Vec<String> {
    let mask = unsafe { GetLogicalDrives() };
    (0..26u32)
        .filter(|bit| mask & (1 << bit) != 0)
        .map(|bit| format!("{}:\\", (b'A' + bit as u8) as char))
        .filter(|root| unsafe { GetDriveTypeW(&HSTRING::from(root.as_str())) } == DRIVE_FIXED)
        .collect()
}

pub struct WindowsVolume {
    root: String,
    handle: OwnedHandle,
}

impl WindowsVolume {
    /// Open `\\.\X:` for read/write with buffering disabled.
    pub fn open(root: &str) -> PlatformResult<Self> {
        let letter = root.trim_end_matches(['\\', ':']);
        let path = HSTRING::from(format!("\\\\.\\{}:", letter));
        let handle = unsafe {
            CreateFileW(
                &path,
                (GENERIC_READ | GENERIC_WRITE).0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAG_NO_BUFFERING,
                HANDLE::default(),
            )?
        };
        Ok(Self { root: root.to_string(), handle: OwnedHandle::new(handle) })
    }

    fn control(&self, code: u32, input: Option<&[u8]>) -> PlatformResult<()> {
        let mut returned = 0u32;
        let (buffer, length) = match input {
            Some(bytes) => (Some(bytes.as_ptr() as *const c_void), bytes.len() as u32),
            None => (None, 0),
        };
        unsafe {
            DeviceIoControl(self.handle.raw(), code, buffer, length, None, 0, Some(&mut returned), None)?;
        }
        Ok(())
    }
}

impl VolumeHandle for WindowsVolume {
    fn root(&self) -> &str {
        &self.root
    }

    fn reset_write_order(&mut self) -> PlatformResult<()> {
        self.control(fsctl::FSCTL_RESET_WRITE_ORDER, Some(&[0u8]))
    }

    fn discard_cache(&mut self) -> PlatformResult<()> {
        self.control(fsctl::FSCTL_DISCARD_VOLUME_CACHE, None)
    }

    fn flush(&mut self) -> PlatformResult<()> {
        unsafe { FlushFileBuffers(self.handle.raw())? };
        Ok(())
    }
}
