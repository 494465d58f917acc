//! Memory snapshots and human-scaled sizes

use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;

use crate::platform::{MemoryApi, MemoryCounters, PlatformResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MemoryUnit {
    B,
    KB,
    MB,
    GB,
    TB,
    PB,
    EB,
    ZB,
    YB,
}

impl MemoryUnit {
    const UNITS: [MemoryUnit; 9] = [
        MemoryUnit::B,
        MemoryUnit::KB,
        MemoryUnit::MB,
        MemoryUnit::GB,
        MemoryUnit::TB,
        MemoryUnit::PB,
        MemoryUnit::EB,
        MemoryUnit::ZB,
        MemoryUnit::YB,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for MemoryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Scale a byte count to the largest unit that keeps the value at or above 1.
///
/// Values under 1024 stay in bytes, undivided.
pub fn to_memory_unit(bytes: u64) -> (f64, MemoryUnit) {
    let mut index = 0usize;
    let mut remaining = bytes;
    while remaining >= 1024 && index < MemoryUnit::UNITS.len() - 1 {
        remaining /= 1024;
        index += 1;
    }
    let value = bytes as f64 / 1024f64.powi(index as i32);
    (value, MemoryUnit::UNITS[index])
}

/// Render with at most one decimal, dropping a trailing ".0".
pub fn format_value(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.1}", rounded)
    }
}

/// Format bytes as e.g. "1.5 GB".
///
/// A value that rounds up to 1024 moves to the next unit.
pub fn format_bytes(bytes: u64) -> String {
    let (mut value, mut unit) = to_memory_unit(bytes);
    if unit != MemoryUnit::B && (value * 10.0).round() >= 10240.0 {
        if let Some(next) = MemoryUnit::UNITS.iter().position(|u| *u == unit).and_then(|i| MemoryUnit::UNITS.get(i + 1)) {
            value /= 1024.0;
            unit = *next;
        }
    }
    format!("{} {}", format_value(value), unit)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemorySize {
    pub bytes: u64,
    pub value: f64,
    pub unit: MemoryUnit,
    pub percentage: u32,
}

impl MemorySize {
    pub fn new(bytes: u64, percentage: u32) -> Self {
        let (value, unit) = to_memory_unit(bytes);
        Self { bytes, value, unit, percentage }
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({}%)", format_value(self.value), self.unit, self.percentage)
    }
}

/// Used/free split of one memory pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemoryStats {
    pub total: MemorySize,
    pub free: MemorySize,
    pub used: MemorySize,
}

impl MemoryStats {
    /// `load` is the OS supplied used percentage; derived from the sizes when absent.
    pub fn new(total: u64, free: u64, load: Option<u32>) -> Self {
        // a transient read can report available > total
        let used_bytes = total.max(free) - total.min(free);
        let used_percent = load
            .unwrap_or_else(|| {
                if total > 0 {
                    (used_bytes as u128 * 100 / total as u128) as u32
                } else {
                    0
                }
            })
            .min(100);

        Self {
            total: MemorySize::new(total, 100),
            free: MemorySize::new(free, 100 - used_percent),
            used: MemorySize::new(used_bytes, used_percent),
        }
    }
}

impl fmt::Display for MemoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {}) Used | {} - Free | {}",
            format_value(self.total.value),
            self.total.unit,
            self.used,
            self.free
        )
    }
}

/// Point-in-time view of physical and virtual memory. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySnapshot {
    pub taken_at: DateTime<Local>,
    pub physical: MemoryStats,
    #[serde(rename = "virtual")]
    pub virtual_memory: MemoryStats,
}

impl MemorySnapshot {
    pub fn from_counters(counters: &MemoryCounters) -> Self {
        Self {
            taken_at: Local::now(),
            physical: MemoryStats::new(
                counters.total_physical,
                counters.available_physical,
                counters.memory_load,
            ),
            virtual_memory: MemoryStats::new(counters.total_virtual, counters.available_virtual, None),
        }
    }

    pub fn is_high_pressure(&self) -> bool {
        self.physical.used.percentage > 80
    }

    pub fn is_critical(&self) -> bool {
        self.physical.used.percentage > 95
    }
}

impl fmt::Display for MemorySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Physical: {}\nVirtual: {}", self.physical, self.virtual_memory)
    }
}

/// Issue one OS query and build a snapshot from it.
pub fn read_snapshot(api: &dyn MemoryApi) -> PlatformResult<MemorySnapshot> {
    let counters = api.memory_counters()?;
    Ok(MemorySnapshot::from_counters(&counters))
}

/// Free memory gained (or lost) between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReleasedMemory {
    pub physical_bytes: u64,
    pub virtual_bytes: u64,
}

impl ReleasedMemory {
    pub fn between(before: &MemorySnapshot, after: &MemorySnapshot) -> Self {
        Self {
            physical_bytes: before.physical.free.bytes.abs_diff(after.physical.free.bytes),
            virtual_bytes: before.virtual_memory.free.bytes.abs_diff(after.virtual_memory.free.bytes),
        }
    }

    /// Notification text summarizing the run.
    pub fn summary(&self, include_virtual: bool) -> String {
        let physical = format_bytes(self.physical_bytes);
        if include_virtual {
            format!(
                "Memory optimized\n\nPhysical: {} | Virtual: {}",
                physical,
                format_bytes(self.virtual_bytes)
            )
        } else {
            format!("Memory optimized\n\nPhysical: {}", physical)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockMemoryApi;

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_memory_unit_boundaries() {
        assert_eq!(to_memory_unit(0), (0.0, MemoryUnit::B));
        assert_eq!(to_memory_unit(1023), (1023.0, MemoryUnit::B));
        assert_eq!(to_memory_unit(1024), (1.0, MemoryUnit::KB));
        assert_eq!(to_memory_unit(1536), (1.5, MemoryUnit::KB));
        assert_eq!(to_memory_unit(1024 * 1024), (1.0, MemoryUnit::MB));
    }

    #[test]
    fn test_memory_unit_scales_back_to_bytes() {
        for bytes in [1u64, 1000, 4096, 123_456_789, 16 * GB + 12345, u64::MAX] {
            let (value, unit) = to_memory_unit(bytes);
            let restored = value * 1024f64.powi(unit.index() as i32);
            assert!((restored - bytes as f64).abs() <= bytes as f64 * 1e-12, "bytes {}", bytes);
            assert!(value < 1024.0);
            if bytes >= 1024 {
                assert!(value >= 1.0);
            }
        }
        assert_eq!(to_memory_unit(u64::MAX).1, MemoryUnit::EB);
    }

    #[test]
    fn test_stats_percentages_sum_to_100() {
        for (total, free) in [(16 * GB, 4 * GB), (8 * GB, 8 * GB), (3, 1), (100, 0)] {
            let stats = MemoryStats::new(total, free, None);
            assert_eq!(stats.used.bytes, total - free);
            assert_eq!(stats.used.percentage + stats.free.percentage, 100);
        }
    }

    #[test]
    fn test_stats_zero_total() {
        let stats = MemoryStats::new(0, 0, None);
        assert_eq!(stats.used.percentage, 0);
        assert_eq!(stats.free.percentage, 100);
    }

    #[test]
    fn test_stats_available_above_total() {
        let stats = MemoryStats::new(4 * GB, 5 * GB, None);
        assert_eq!(stats.used.bytes, GB);
        assert_eq!(stats.used.percentage, 25);
    }

    #[test]
    fn test_stats_prefers_os_load() {
        let stats = MemoryStats::new(16 * GB, 4 * GB, Some(77));
        assert_eq!(stats.used.percentage, 77);
        assert_eq!(stats.free.percentage, 23);
    }

    #[test]
    fn test_display_formats() {
        let stats = MemoryStats::new(16 * GB, 4 * GB, None);
        assert_eq!(stats.to_string(), "(16 GB) Used | 12 GB (75%) - Free | 4 GB (25%)");
        assert_eq!(format_bytes(1536 * 1024 * 1024), "1.5 GB");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024 * 1024 - 1), "1 MB");
        assert_eq!(format_bytes(1023), "1023 B");
    }

    #[test]
    fn test_read_snapshot_uses_counters() {
        let api = MockMemoryApi::windows_10().with_counters(MemoryCounters {
            memory_load: Some(50),
            total_physical: 8 * GB,
            available_physical: 4 * GB,
            total_virtual: 12 * GB,
            available_virtual: 9 * GB,
        });
        let snapshot = read_snapshot(&api).unwrap();
        assert_eq!(snapshot.physical.used.percentage, 50);
        assert_eq!(snapshot.virtual_memory.used.bytes, 3 * GB);
        assert_eq!(snapshot.virtual_memory.used.percentage, 25);
    }

    #[test]
    fn test_released_memory_summary() {
        let before = MemorySnapshot::from_counters(&MemoryCounters {
            memory_load: None,
            total_physical: 8 * GB,
            available_physical: 2 * GB,
            total_virtual: 12 * GB,
            available_virtual: 5 * GB,
        });
        let after = MemorySnapshot::from_counters(&MemoryCounters {
            memory_load: None,
            total_physical: 8 * GB,
            available_physical: 3 * GB + 512 * 1024 * 1024,
            total_virtual: 12 * GB,
            available_virtual: 5 * GB + 300 * 1024 * 1024,
        });
        let released = ReleasedMemory::between(&before, &after);
        assert_eq!(released.physical_bytes, GB + 512 * 1024 * 1024);
        assert_eq!(
            released.summary(true),
            "Memory optimized\n\nPhysical: 1.5 GB | Virtual: 300 MB"
        );
        assert_eq!(released.summary(false), "Memory optimized\n\nPhysical: 1.5 GB");
    }
}
