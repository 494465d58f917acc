//! Automatic optimization triggers
//!
//! Two triggers, checked in order: a fixed interval in hours, and free
//! physical memory dropping below a percentage.

use std::time::{Duration, Instant};

use super::areas::{MemoryAreas, OptimizationReason};
use super::config::OptimizerConfig;
use super::memory::MemorySnapshot;

/// Minimum gap between two usage-triggered runs.
pub const USAGE_COOLDOWN: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct AutoOptimizationPolicy {
    interval: Option<Duration>,
    usage_threshold: Option<u32>,
    areas: MemoryAreas,
    last_scheduled: Instant,
    last_usage: Instant,
}

impl AutoOptimizationPolicy {
    /// `areas` is the effective selection; timers start at `now`.
    pub fn new(config: &OptimizerConfig, areas: MemoryAreas, now: Instant) -> Self {
        let interval = (config.auto_optimization_interval_hours > 0)
            .then(|| Duration::from_secs(u64::from(config.auto_optimization_interval_hours) * 3600));
        let usage_threshold =
            (config.auto_optimization_memory_usage > 0).then_some(config.auto_optimization_memory_usage);

        Self {
            interval,
            usage_threshold,
            areas,
            last_scheduled: now,
            last_usage: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.areas.is_empty() && (self.interval.is_some() || self.usage_threshold.is_some())
    }

    /// Decide whether a run is due and, if so, record it as started.
    pub fn evaluate(&mut self, now: Instant, snapshot: Option<&MemorySnapshot>) -> Option<OptimizationReason> {
        if self.areas.is_empty() {
            return None;
        }

        if let Some(interval) = self.interval {
            if now.saturating_duration_since(self.last_scheduled) >= interval {
                self.last_scheduled = now;
                return Some(OptimizationReason::Scheduled);
            }
        }

        if let (Some(threshold), Some(snapshot)) = (self.usage_threshold, snapshot) {
            if snapshot.physical.free.percentage < threshold
                && now.saturating_duration_since(self.last_usage) >= USAGE_COOLDOWN
            {
                self.last_usage = now;
                return Some(OptimizationReason::Usage);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::areas::MemoryArea;
    use crate::platform::MemoryCounters;

    const GB: u64 = 1 << 30;

    fn snapshot(free_percent: u64) -> MemorySnapshot {
        MemorySnapshot::from_counters(&MemoryCounters {
            memory_load: None,
            total_physical: 100 * GB,
            available_physical: free_percent * GB,
            total_virtual: 200 * GB,
            available_virtual: 100 * GB,
        })
    }

    fn config(interval_hours: u32, usage: u32) -> OptimizerConfig {
        OptimizerConfig {
            auto_optimization_interval_hours: interval_hours,
            auto_optimization_memory_usage: usage,
            ..OptimizerConfig::default()
        }
    }

    #[test]
    fn test_disabled_by_default() {
        let start = Instant::now();
        let mut policy = AutoOptimizationPolicy::new(&OptimizerConfig::default(), MemoryAreas::ALL, start);
        assert!(!policy.is_enabled());
        let later = start + Duration::from_secs(24 * 3600);
        assert_eq!(policy.evaluate(later, Some(&snapshot(1))), None);
    }

    #[test]
    fn test_interval_trigger() {
        let start = Instant::now();
        let mut policy = AutoOptimizationPolicy::new(&config(2, 0), MemoryAreas::ALL, start);

        assert_eq!(policy.evaluate(start + Duration::from_secs(3600), None), None);
        let due = start + Duration::from_secs(2 * 3600);
        assert_eq!(policy.evaluate(due, None), Some(OptimizationReason::Scheduled));
        assert_eq!(policy.evaluate(due + Duration::from_secs(60), None), None);
    }

    #[test]
    fn test_usage_trigger_with_cooldown() {
        let start = Instant::now();
        let mut policy = AutoOptimizationPolicy::new(&config(0, 20), MemoryAreas::ALL, start);

        // cooldown counts from policy creation
        assert_eq!(policy.evaluate(start, Some(&snapshot(10))), None);

        let t1 = start + USAGE_COOLDOWN;
        assert_eq!(policy.evaluate(t1, Some(&snapshot(30))), None);
        assert_eq!(policy.evaluate(t1, Some(&snapshot(10))), Some(OptimizationReason::Usage));
        assert_eq!(policy.evaluate(t1 + Duration::from_secs(60), Some(&snapshot(10))), None);
        assert_eq!(
            policy.evaluate(t1 + USAGE_COOLDOWN, Some(&snapshot(10))),
            Some(OptimizationReason::Usage)
        );
    }

    #[test]
    fn test_no_trigger_without_areas() {
        let start = Instant::now();
        let mut policy = AutoOptimizationPolicy::new(&config(1, 90), MemoryAreas::NONE, start);
        assert!(!policy.is_enabled());
        let later = start + Duration::from_secs(10 * 3600);
        assert_eq!(policy.evaluate(later, Some(&snapshot(1))), None);
    }

    #[test]
    fn test_interval_checked_before_usage() {
        let start = Instant::now();
        let areas = MemoryAreas::from(MemoryArea::StandbyList);
        let mut policy = AutoOptimizationPolicy::new(&config(1, 50), areas, start);
        let later = start + Duration::from_secs(3600);
        assert_eq!(policy.evaluate(later, Some(&snapshot(10))), Some(OptimizationReason::Scheduled));
        assert_eq!(policy.evaluate(later, Some(&snapshot(10))), Some(OptimizationReason::Usage));
    }
}
