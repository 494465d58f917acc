//! Platform Abstraction Traits for the Memory Optimization Engine
//!
//! Every OS interaction the engine performs goes through [`MemoryApi`]. The
//! reclamation operations and the orchestrator only ever see this trait,
//! which keeps them free of `unsafe` and lets tests script the OS.
//!
//! ```text
//! +--------------------+
//! | core::operations   |  <- sequencing, privileges, aggregation
//! +--------------------+
//!          |
//!    +-----v-----+
//!    | MemoryApi |        <- This module (defines the seam)
//!    +-----------+
//!     |         |
//! +---v---+ +---v-----+
//! | Win32 | | generic |   <- Platform-specific implementations
//! +-------+ +---------+
//! ```

use thiserror::Error;

use crate::core::capability::OsVersion;
use crate::core::config::Priority;
use crate::windows::ffi::{error_code, SystemInformationRequest};

// ============================================================================
// Error Types
// ============================================================================

/// Error reported by a single OS call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The OS call failed with a Win32 error code
    #[error("{message} (error {code})")]
    Os { code: u32, message: String },
    /// The call has no implementation on this platform
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl PlatformError {
    pub fn os(code: u32, message: impl Into<String>) -> Self {
        PlatformError::Os { code, message: message.into() }
    }

    /// Build an error from a raw OS error code using the system message table.
    pub fn from_code(code: u32) -> Self {
        let message = std::io::Error::from_raw_os_error(code as i32).to_string();
        // io::Error appends " (os error N)"; the code is rendered separately
        let message = match message.rfind(" (os error") {
            Some(idx) => message[..idx].to_string(),
            None => message,
        };
        PlatformError::Os { code, message }
    }

    /// Capture the calling thread's last OS error.
    pub fn last_os_error() -> Self {
        let err = std::io::Error::last_os_error();
        let code = err.raw_os_error().unwrap_or(-1) as u32;
        Self::from_code(code)
    }

    pub fn code(&self) -> Option<u32> {
        match self {
            PlatformError::Os { code, .. } => Some(*code),
            PlatformError::NotSupported(_) => None,
        }
    }

    /// Protected and system processes refuse working-set trims this way.
    pub fn is_access_denied(&self) -> bool {
        self.code() == Some(error_code::ERROR_ACCESS_DENIED)
    }

    /// The process exited between enumeration and open.
    pub fn is_process_gone(&self) -> bool {
        self.code() == Some(error_code::ERROR_INVALID_PARAMETER)
    }
}

#[cfg(windows)]
impl From<windows::core::Error> for PlatformError {
    fn from(err: windows::core::Error) -> Self {
        let hresult = err.code().0 as u32;
        // HRESULT_FROM_WIN32 wraps the Win32 code in facility 7
        let code = if hresult & 0xFFFF_0000 == 0x8007_0000 {
            hresult & 0xFFFF
        } else {
            hresult
        };
        PlatformError::Os { code, message: err.message().to_string() }
    }
}

/// Result type alias for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

// ============================================================================
// Data Types
// ============================================================================

/// Raw memory counters from one OS query, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryCounters {
    /// Physical memory load as reported by the OS (0-100), when available
    pub memory_load: Option<u32>,
    pub total_physical: u64,
    pub available_physical: u64,
    /// Commit limit (page file backed virtual memory)
    pub total_virtual: u64,
    pub available_virtual: u64,
}

/// A running process as seen during enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self { pid, name: name.into() }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// An open raw volume handle. Dropping it releases the OS handle.
pub trait VolumeHandle {
    /// Volume root, e.g. `C:\`.
    fn root(&self) -> &str;

    /// Issue `FSCTL_RESET_WRITE_ORDER`.
    fn reset_write_order(&mut self) -> PlatformResult<()>;

    /// Issue `FSCTL_DISCARD_VOLUME_CACHE`.
    fn discard_cache(&mut self) -> PlatformResult<()>;

    /// Force all buffered data for the volume to disk.
    fn flush(&mut self) -> PlatformResult<()>;
}

/// OS memory management primitives used by the reclamation operations.
///
/// Implementations must be callable from the optimization worker thread and
/// the monitor thread at the same time; none of the methods retry.
pub trait MemoryApi: Send + Sync {
    /// Kernel version, used by the capability probe.
    fn os_version(&self) -> OsVersion;

    /// Whether the kernel is 64-bit (selects the file cache payload layout).
    fn is_64bit(&self) -> bool {
        cfg!(target_pointer_width = "64")
    }

    /// Whether the current process token is elevated.
    fn is_elevated(&self) -> bool {
        false
    }

    /// Query physical and virtual memory counters in a single call.
    fn memory_counters(&self) -> PlatformResult<MemoryCounters>;

    /// Enable the named privilege (e.g. `SeDebugPrivilege`) on the process token.
    ///
    /// Returns `false` when the lookup or the adjustment fails.
    fn enable_privilege(&self, name: &str) -> bool;

    /// Enumerate running processes.
    fn processes(&self) -> PlatformResult<Vec<ProcessEntry>>;

    /// Ask the OS to trim the working set of a process.
    ///
    /// # Arguments
    ///
    /// * `pid` - Process ID to trim
    fn empty_working_set(&self, pid: u32) -> PlatformResult<()>;

    /// Issue one `NtSetSystemInformation` request.
    fn set_system_information(&self, request: SystemInformationRequest) -> PlatformResult<()>;

    /// Shrink the system file cache to its minimum, flushing it.
    fn flush_system_file_cache(&self) -> PlatformResult<()>;

    /// Roots of all fixed (non-removable) drives.
    fn fixed_volumes(&self) -> Vec<String>;

    /// Open a raw handle on a volume; `None` when it cannot be opened.
    fn open_volume(&self, root: &str) -> Option<Box<dyn VolumeHandle>>;

    /// Release memory the engine's own process no longer uses.
    fn release_own_memory(&self) -> PlatformResult<()>;

    /// Set the scheduling priority of the engine's own process.
    fn apply_priority(&self, priority: Priority) -> PlatformResult<()>;
}
