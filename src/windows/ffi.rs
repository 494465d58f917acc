//! Fixed binary layouts and constants shared with the NT kernel
//!
//! These types are compiled on every target so their layout can be checked
//! anywhere; only the Win32 backend actually hands them to the OS.

/// `SYSTEM_INFORMATION_CLASS` values used by `NtSetSystemInformation`.
pub mod information_class {
    pub const SYSTEM_FILE_CACHE_INFORMATION: i32 = 0x15;
    pub const SYSTEM_MEMORY_LIST_INFORMATION: i32 = 0x50;
    pub const SYSTEM_COMBINE_PHYSICAL_MEMORY_INFORMATION: i32 = 0x82;
}

/// Win32 error codes the engine reacts to.
pub mod error_code {
    pub const ERROR_SUCCESS: u32 = 0;
    pub const ERROR_ACCESS_DENIED: u32 = 5;
    pub const ERROR_INVALID_PARAMETER: u32 = 87;
    pub const ERROR_NOT_ALL_ASSIGNED: u32 = 1300;
}

/// Volume control codes.
pub mod fsctl {
    pub const FSCTL_DISCARD_VOLUME_CACHE: u32 = 0x0009_0054;
    pub const FSCTL_RESET_WRITE_ORDER: u32 = 0x0009_00F8;
}

/// `GetDriveTypeW` result for non-removable disks.
pub const DRIVE_FIXED: u32 = 3;

/// `SYSTEM_MEMORY_LIST_COMMAND`, passed as a 32-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum MemoryListCommand {
    FlushModifiedList = 3,
    PurgeStandbyList = 4,
    PurgeLowPriorityStandbyList = 5,
}

/// `SYSTEM_FILECACHE_INFORMATION` on a 32-bit kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct SystemCacheInformation32 {
    pub current_size: u32,
    pub peak_size: u32,
    pub page_fault_count: u32,
    pub minimum_working_set: u32,
    pub maximum_working_set: u32,
    pub unused: [u32; 4],
}

/// `SYSTEM_FILECACHE_INFORMATION` on a 64-bit kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct SystemCacheInformation64 {
    pub current_size: i64,
    pub peak_size: i64,
    pub page_fault_count: i64,
    pub minimum_working_set: i64,
    pub maximum_working_set: i64,
    pub unused: [i64; 4],
}

/// File cache bounds that tell the kernel to shrink the cache working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCacheInformation {
    Bits32(SystemCacheInformation32),
    Bits64(SystemCacheInformation64),
}

impl SystemCacheInformation {
    /// Minimum and maximum working set set to the "unlimited" sentinel.
    pub fn unlimited(is_64bit: bool) -> Self {
        if is_64bit {
            Self::Bits64(SystemCacheInformation64 {
                minimum_working_set: -1,
                maximum_working_set: -1,
                ..Default::default()
            })
        } else {
            Self::Bits32(SystemCacheInformation32 {
                minimum_working_set: u32::MAX,
                maximum_working_set: u32::MAX,
                ..Default::default()
            })
        }
    }
}

/// `MEMORY_COMBINE_INFORMATION_EX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, packed)]
pub struct MemoryCombineInformationEx {
    pub handle: usize,
    pub pages_combined: usize,
    pub flags: u64,
}

/// One `NtSetSystemInformation` call the engine knows how to make.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemInformationRequest {
    MemoryList(MemoryListCommand),
    /// Unlimited file cache working set; the payload width follows the kernel.
    FileCacheUnlimited,
    CombinePhysicalMemory,
}

impl SystemInformationRequest {
    pub fn information_class(&self) -> i32 {
        match self {
            SystemInformationRequest::MemoryList(_) => information_class::SYSTEM_MEMORY_LIST_INFORMATION,
            SystemInformationRequest::FileCacheUnlimited => information_class::SYSTEM_FILE_CACHE_INFORMATION,
            SystemInformationRequest::CombinePhysicalMemory => {
                information_class::SYSTEM_COMBINE_PHYSICAL_MEMORY_INFORMATION
            }
        }
    }
}
