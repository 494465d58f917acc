//! Memory areas a user can select for optimization

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

/// One independently selectable reclamation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryArea {
    CombinedPageList,
    ModifiedPageList,
    ProcessesWorkingSet,
    StandbyList,
    StandbyListLowPriority,
    SystemWorkingSet,
    ModifiedFileCache,
}

impl MemoryArea {
    pub const ALL: [MemoryArea; 7] = [
        MemoryArea::ProcessesWorkingSet,
        MemoryArea::SystemWorkingSet,
        MemoryArea::ModifiedPageList,
        MemoryArea::StandbyList,
        MemoryArea::StandbyListLowPriority,
        MemoryArea::CombinedPageList,
        MemoryArea::ModifiedFileCache,
    ];

    /// Bit value of this area inside a [`MemoryAreas`] mask.
    pub const fn bit(self) -> u32 {
        match self {
            MemoryArea::CombinedPageList => 1,
            MemoryArea::ModifiedPageList => 2,
            MemoryArea::ProcessesWorkingSet => 4,
            MemoryArea::StandbyList => 8,
            MemoryArea::StandbyListLowPriority => 16,
            MemoryArea::SystemWorkingSet => 32,
            MemoryArea::ModifiedFileCache => 64,
        }
    }

    /// Human readable label, also used for progress steps.
    pub const fn label(self) -> &'static str {
        match self {
            MemoryArea::CombinedPageList => "Combined Page List",
            MemoryArea::ModifiedPageList => "Modified Page List",
            MemoryArea::ProcessesWorkingSet => "Processes Working Set",
            MemoryArea::StandbyList => "Standby List",
            MemoryArea::StandbyListLowPriority => "Standby List (Low Priority)",
            MemoryArea::SystemWorkingSet => "System Working Set",
            MemoryArea::ModifiedFileCache => "Modified File Cache",
        }
    }

    /// Parse the snake_case name used in config files and on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|area| area.name() == normalized)
    }

    pub const fn name(self) -> &'static str {
        match self {
            MemoryArea::CombinedPageList => "combined_page_list",
            MemoryArea::ModifiedPageList => "modified_page_list",
            MemoryArea::ProcessesWorkingSet => "processes_working_set",
            MemoryArea::StandbyList => "standby_list",
            MemoryArea::StandbyListLowPriority => "standby_list_low_priority",
            MemoryArea::SystemWorkingSet => "system_working_set",
            MemoryArea::ModifiedFileCache => "modified_file_cache",
        }
    }
}

impl fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A set of [`MemoryArea`] flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryAreas(u32);

impl MemoryAreas {
    pub const NONE: MemoryAreas = MemoryAreas(0);
    pub const ALL: MemoryAreas = MemoryAreas(0b111_1111);
    pub const STANDBY: MemoryAreas = MemoryAreas(
        MemoryArea::StandbyList.bit() | MemoryArea::StandbyListLowPriority.bit(),
    );

    /// Build a mask from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        MemoryAreas(bits & Self::ALL.0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, area: MemoryArea) -> bool {
        self.0 & area.bit() != 0
    }

    pub const fn intersects(self, other: MemoryAreas) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, area: MemoryArea) {
        self.0 |= area.bit();
    }

    pub fn remove(&mut self, area: MemoryArea) {
        self.0 &= !area.bit();
    }

    /// Select `area`, clearing the other standby variant when one is chosen.
    pub fn select(&mut self, area: MemoryArea) {
        self.insert(area);
        match area {
            MemoryArea::StandbyList => self.remove(MemoryArea::StandbyListLowPriority),
            MemoryArea::StandbyListLowPriority => self.remove(MemoryArea::StandbyList),
            _ => {}
        }
    }

    /// Flip `area`; turning a standby variant on clears the other one.
    pub fn toggle(&mut self, area: MemoryArea) {
        if self.contains(area) {
            self.remove(area);
        } else {
            self.select(area);
        }
    }

    /// Both standby variants act on the same cache. Keep the normal one.
    pub fn normalized(self) -> Self {
        let mut areas = self;
        if areas.contains(MemoryArea::StandbyList) && areas.contains(MemoryArea::StandbyListLowPriority) {
            areas.remove(MemoryArea::StandbyListLowPriority);
        }
        areas
    }

    pub fn iter(self) -> impl Iterator<Item = MemoryArea> {
        MemoryArea::ALL.into_iter().filter(move |area| self.contains(*area))
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }
}

impl From<MemoryArea> for MemoryAreas {
    fn from(area: MemoryArea) -> Self {
        MemoryAreas(area.bit())
    }
}

impl FromIterator<MemoryArea> for MemoryAreas {
    fn from_iter<I: IntoIterator<Item = MemoryArea>>(iter: I) -> Self {
        iter.into_iter().fold(MemoryAreas::NONE, |acc, area| acc | area)
    }
}

impl BitOr for MemoryAreas {
    type Output = MemoryAreas;
    fn bitor(self, rhs: MemoryAreas) -> MemoryAreas {
        MemoryAreas(self.0 | rhs.0)
    }
}

impl BitOr<MemoryArea> for MemoryAreas {
    type Output = MemoryAreas;
    fn bitor(self, rhs: MemoryArea) -> MemoryAreas {
        MemoryAreas(self.0 | rhs.bit())
    }
}

impl BitOr for MemoryArea {
    type Output = MemoryAreas;
    fn bitor(self, rhs: MemoryArea) -> MemoryAreas {
        MemoryAreas(self.bit() | rhs.bit())
    }
}

impl BitOrAssign<MemoryArea> for MemoryAreas {
    fn bitor_assign(&mut self, rhs: MemoryArea) {
        self.insert(rhs);
    }
}

impl BitAnd for MemoryAreas {
    type Output = MemoryAreas;
    fn bitand(self, rhs: MemoryAreas) -> MemoryAreas {
        MemoryAreas(self.0 & rhs.0)
    }
}

impl Not for MemoryAreas {
    type Output = MemoryAreas;
    fn not(self) -> MemoryAreas {
        MemoryAreas(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for MemoryAreas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        let labels: Vec<&str> = self.iter().map(MemoryArea::label).collect();
        f.write_str(&labels.join(", "))
    }
}

/// Why an optimization run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationReason {
    Manual,
    Scheduled,
    Usage,
}

impl fmt::Display for OptimizationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationReason::Manual => write!(f, "Manual"),
            OptimizationReason::Scheduled => write!(f, "Scheduled"),
            OptimizationReason::Usage => write!(f, "Usage"),
        }
    }
}
