//! Which memory areas the running OS version can optimize
//!
//! Version gates are fixed for the lifetime of the process, so the probe is
//! computed once and copied wherever it is needed.

use super::areas::{MemoryArea, MemoryAreas};
use std::fmt;

/// Operating system version as reported by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
}

impl OsVersion {
    /// Returned when the host is not a Windows NT kernel.
    pub const UNKNOWN: OsVersion = OsVersion::new(0, 0, 0);
    pub const WINDOWS_XP: OsVersion = OsVersion::new(5, 1, 0);
    pub const WINDOWS_VISTA: OsVersion = OsVersion::new(6, 0, 0);
    pub const WINDOWS_7: OsVersion = OsVersion::new(6, 1, 0);
    pub const WINDOWS_8: OsVersion = OsVersion::new(6, 2, 0);

    pub const fn new(major: u32, minor: u32, build: u32) -> Self {
        Self { major, minor, build }
    }

    pub fn is_at_least(&self, other: OsVersion) -> bool {
        *self >= other
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    os: OsVersion,
    is_64bit: bool,
}

impl Capabilities {
    pub fn probe(os: OsVersion, is_64bit: bool) -> Self {
        Self { os, is_64bit }
    }

    pub fn os_version(&self) -> OsVersion {
        self.os
    }

    pub fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    pub fn has_combined_page_list(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_8)
    }

    pub fn has_modified_page_list(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_VISTA)
    }

    pub fn has_standby_list(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_VISTA)
    }

    pub fn has_processes_working_set(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_XP)
    }

    pub fn has_system_working_set(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_XP)
    }

    pub fn has_modified_file_cache(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_XP)
    }

    /// `FSCTL_RESET_WRITE_ORDER` gate inside the file cache operation.
    pub fn can_reset_write_order(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_7)
    }

    /// `FSCTL_DISCARD_VOLUME_CACHE` gate inside the file cache operation.
    pub fn can_discard_volume_cache(&self) -> bool {
        self.os.is_at_least(OsVersion::WINDOWS_8)
    }

    pub fn is_area_supported(&self, area: MemoryArea) -> bool {
        match area {
            MemoryArea::CombinedPageList => self.has_combined_page_list(),
            MemoryArea::ModifiedPageList => self.has_modified_page_list(),
            MemoryArea::ProcessesWorkingSet => self.has_processes_working_set(),
            MemoryArea::StandbyList | MemoryArea::StandbyListLowPriority => self.has_standby_list(),
            MemoryArea::SystemWorkingSet => self.has_system_working_set(),
            MemoryArea::ModifiedFileCache => self.has_modified_file_cache(),
        }
    }

    pub fn supported_areas(&self) -> MemoryAreas {
        MemoryArea::ALL
            .into_iter()
            .filter(|area| self.is_area_supported(*area))
            .collect()
    }

    /// Silently clear every requested area this OS cannot optimize.
    pub fn filter(&self, areas: MemoryAreas) -> MemoryAreas {
        areas & self.supported_areas()
    }
}
