//! Platform Abstraction Layer for the Memory Optimization Engine
//!
//! The engine never calls the OS directly. Reclamation operations, the
//! snapshot reader and the monitor all go through [`MemoryApi`], and this
//! module picks the implementation for the build target.
//!
//! # Architecture
//!
//! ```text
//! src/platform/
//! +-- mod.rs           <- This file (selection and platform info)
//! +-- traits.rs        <- MemoryApi, VolumeHandle, PlatformError
//! +-- generic.rs       <- Read-only sysinfo fallback (non-Windows)
//! +-- mock.rs          <- Scripted implementation (tests only)
//! +-- (windows/)       <- Win32 implementation lives in src/windows/
//! ```
//!
//! # Platform Support
//!
//! | Feature | Windows | Other |
//! |---------|---------|-------|
//! | Memory snapshot | GlobalMemoryStatusEx | sysinfo |
//! | Working set trim | EmptyWorkingSet | - |
//! | Memory lists / file cache | NtSetSystemInformation | - |
//! | Volume cache flush | DeviceIoControl + FlushFileBuffers | - |

use std::sync::Arc;

pub mod traits;

pub use traits::{
    MemoryApi, MemoryCounters, PlatformError, PlatformResult, ProcessEntry, VolumeHandle,
};

#[cfg(not(windows))]
pub mod generic;

#[cfg(test)]
pub(crate) mod mock;

/// Platform-specific `MemoryApi` type alias for Windows.
#[cfg(windows)]
pub type PlatformMemoryApi = crate::windows::WindowsMemoryApi;

/// Platform-specific `MemoryApi` type alias for everything else.
#[cfg(not(windows))]
pub type PlatformMemoryApi = generic::GenericMemoryApi;

/// Build the `MemoryApi` for the current target.
pub fn create_platform() -> Arc<dyn MemoryApi> {
    Arc::new(PlatformMemoryApi::new())
}

// ============================================================================
// Platform Detection Utilities
// ============================================================================

/// Information about the current platform.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PlatformInfo {
    /// Operating system name
    pub os_name: &'static str,
    /// Kernel version as seen by the capability probe
    pub os_version: String,
    /// CPU architecture
    pub arch: &'static str,
    /// 64-bit kernel (selects the file cache payload layout)
    pub is_64bit: bool,
    /// Whether running with elevated privileges
    pub is_elevated: bool,
}

/// Describe the platform behind `api`.
pub fn detect_platform(api: &dyn MemoryApi) -> PlatformInfo {
    PlatformInfo {
        os_name: std::env::consts::OS,
        os_version: api.os_version().to_string(),
        arch: std::env::consts::ARCH,
        is_64bit: api.is_64bit(),
        is_elevated: api.is_elevated(),
    }
}
