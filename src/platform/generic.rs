//! Read-only fallback for hosts without the Win32 memory manager APIs
//!
//! Memory counters come from sysinfo so the monitor and `status` still work.
//! The OS version is reported as unknown, which makes the capability probe
//! filter every area; reclamation calls refuse with `NotSupported`.

use std::sync::Mutex;
use sysinfo::System;

use super::traits::{
    MemoryApi, MemoryCounters, PlatformError, PlatformResult, ProcessEntry, VolumeHandle,
};
use crate::core::capability::OsVersion;
use crate::core::config::Priority;
use crate::windows::ffi::SystemInformationRequest;

pub struct GenericMemoryApi {
    sys: Mutex<System>,
}

impl GenericMemoryApi {
    pub fn new() -> Self {
        Self { sys: Mutex::new(System::new()) }
    }

    fn unsupported<T>(what: &str) -> PlatformResult<T> {
        Err(PlatformError::NotSupported(format!("{} on {}", what, std::env::consts::OS)))
    }
}

impl Default for GenericMemoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryApi for GenericMemoryApi {
    fn os_version(&self) -> OsVersion {
        OsVersion::UNKNOWN
    }

    fn memory_counters(&self) -> PlatformResult<MemoryCounters> {
        let mut sys = self
            .sys
            .lock()
            .map_err(|_| PlatformError::NotSupported("memory counters (poisoned)".into()))?;
        sys.refresh_memory();

        let total_physical = sys.total_memory();
        let available_physical = sys.available_memory();
        Ok(MemoryCounters {
            memory_load: None,
            total_physical,
            available_physical,
            total_virtual: total_physical + sys.total_swap(),
            available_virtual: available_physical + sys.free_swap(),
        })
    }

    fn enable_privilege(&self, _name: &str) -> bool {
        false
    }

    fn processes(&self) -> PlatformResult<Vec<ProcessEntry>> {
        Ok(crate::windows::process::list_processes())
    }

    fn empty_working_set(&self, _pid: u32) -> PlatformResult<()> {
        Self::unsupported("working set trim")
    }

    fn set_system_information(&self, request: SystemInformationRequest) -> PlatformResult<()> {
        Self::unsupported(&format!("system information class {}", request.information_class()))
    }

    fn flush_system_file_cache(&self) -> PlatformResult<()> {
        Self::unsupported("system file cache flush")
    }

    fn fixed_volumes(&self) -> Vec<String> {
        Vec::new()
    }

    fn open_volume(&self, _root: &str) -> Option<Box<dyn VolumeHandle>> {
        None
    }

    fn release_own_memory(&self) -> PlatformResult<()> {
        Self::unsupported("working set trim")
    }

    fn apply_priority(&self, _priority: Priority) -> PlatformResult<()> {
        Self::unsupported("priority class")
    }
}
