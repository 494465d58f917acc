//! Windows Memory Management Core with Real Win32 APIs

use tracing::{info, warn};
use windows::Win32::System::Memory::SetSystemFileCacheSize;
use windows::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
use windows::Win32::System::Threading::{
    GetCurrentProcess, SetPriorityClass, HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS,
    NORMAL_PRIORITY_CLASS,
};

use super::{ntdll, process, volume};
use crate::core::capability::OsVersion;
use crate::core::config::Priority;
use crate::platform::{
    MemoryApi, MemoryCounters, PlatformResult, ProcessEntry, VolumeHandle,
};
use crate::security::privileges::enable_token_privilege;
use crate::windows::ffi::SystemInformationRequest;

pub struct WindowsMemoryApi {
    os: OsVersion,
    is_64bit: bool,
    has_admin: bool,
}

impl WindowsMemoryApi {
    pub fn new() -> Self {
        let has_admin = Self::check_admin();
        if !has_admin {
            warn!("Running without admin - most memory areas will fail");
        } else {
            info!("Running with admin privileges - full optimization available");
        }
        Self {
            os: ntdll::os_version(),
            is_64bit: Self::check_64bit_os(),
            has_admin,
        }
    }

    fn check_admin() -> bool {
        use std::mem::size_of;
        use windows::Win32::Foundation::HANDLE;
        use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
        use windows::Win32::System::Threading::OpenProcessToken;

        use super::handle::OwnedHandle;

        unsafe {
            let mut token = HANDLE::default();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
                return false;
            }
            let token = OwnedHandle::new(token);

            let mut elevation = TOKEN_ELEVATION::default();
            let mut size = 0u32;
            let result = GetTokenInformation(
                token.raw(),
                TokenElevation,
                Some(&mut elevation as *mut _ as *mut _),
                size_of::<TOKEN_ELEVATION>() as u32,
                &mut size,
            );
            result.is_ok() && elevation.TokenIsElevated != 0
        }
    }

    /// A 32-bit build still talks to a 64-bit kernel under WOW64.
    fn check_64bit_os() -> bool {
        if cfg!(target_pointer_width = "64") {
            return true;
        }
        use windows::Win32::Foundation::BOOL;
        use windows::Win32::System::Threading::IsWow64Process;

        let mut wow64 = BOOL::default();
        unsafe { IsWow64Process(GetCurrentProcess(), &mut wow64).is_ok() && wow64.as_bool() }
    }
}

impl Default for WindowsMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryApi for WindowsMemoryApi {
    fn os_version(&self) -> OsVersion {
        self.os
    }

    fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    fn is_elevated(&self) -> bool {
        self.has_admin
    }

    fn memory_counters(&self) -> PlatformResult<MemoryCounters> {
        let mut status = MEMORYSTATUSEX {
            dwLength: std::mem::size_of::<MEMORYSTATUSEX>() as u32,
            ..Default::default()
        };
        unsafe { GlobalMemoryStatusEx(&mut status)? };

        Ok(MemoryCounters {
            memory_load: Some(status.dwMemoryLoad),
            total_physical: status.ullTotalPhys,
            available_physical: status.ullAvailPhys,
            total_virtual: status.ullTotalPageFile,
            available_virtual: status.ullAvailPageFile,
        })
    }

    fn enable_privilege(&self, name: &str) -> bool {
        match enable_token_privilege(name) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Enabling {} failed: {}", name, e);
                false
            }
        }
    }

    fn processes(&self) -> PlatformResult<Vec<ProcessEntry>> {
        Ok(process::list_processes())
    }

    fn empty_working_set(&self, pid: u32) -> PlatformResult<()> {
        process::trim_working_set(pid)
    }

    fn set_system_information(&self, request: SystemInformationRequest) -> PlatformResult<()> {
        ntdll::set_system_information(request, self.is_64bit)
    }

    fn flush_system_file_cache(&self) -> PlatformResult<()> {
        unsafe { SetSystemFileCacheSize(usize::MAX, usize::MAX, 0)? };
        Ok(())
    }

    fn fixed_volumes(&self) -> Vec<String> {
        volume::fixed_volumes()
    }

    fn open_volume(&self, root: &str) -> Option<Box<dyn VolumeHandle>> {
        match volume::WindowsVolume::open(root) {
            Ok(volume) => Some(Box::new(volume)),
            Err(e) => {
                tracing::debug!("Cannot open volume {}: {}", root, e);
                None
            }
        }
    }

    fn release_own_memory(&self) -> PlatformResult<()> {
        process::trim_own_working_set()
    }

    fn apply_priority(&self, priority: Priority) -> PlatformResult<()> {
        let class = match priority {
            Priority::Low => IDLE_PRIORITY_CLASS,
            Priority::Normal => NORMAL_PRIORITY_CLASS,
            Priority::High => HIGH_PRIORITY_CLASS,
        };
        unsafe { SetPriorityClass(GetCurrentProcess(), class)? };
        Ok(())
    }
}
