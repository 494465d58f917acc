//! Real-time memory monitoring
//!
//! Keeps the latest snapshot and a bounded history. A failed read leaves the
//! previous snapshot in place.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

use crate::core::memory::{read_snapshot, MemorySnapshot};
use crate::platform::{MemoryApi, PlatformResult};

/// One hour of history at the default 5s interval.
pub const DEFAULT_MAX_HISTORY: usize = 720;

pub struct MemoryMonitor {
    api: Arc<dyn MemoryApi>,
    interval: Duration,
    latest: RwLock<Option<Arc<MemorySnapshot>>>,
    history: RwLock<VecDeque<Arc<MemorySnapshot>>>,
    max_history: usize,
}

impl MemoryMonitor {
    pub fn new(api: Arc<dyn MemoryApi>, interval_secs: u64) -> Self {
        Self {
            api,
            interval: Duration::from_secs(interval_secs.max(1)),
            latest: RwLock::new(None),
            history: RwLock::new(VecDeque::new()),
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Read a fresh snapshot and publish it.
    pub async fn refresh(&self) -> PlatformResult<Arc<MemorySnapshot>> {
        let snapshot = match read_snapshot(self.api.as_ref()) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!("Memory snapshot failed, keeping previous: {}", e);
                return Err(e);
            }
        };

        *self.latest.write().await = Some(Arc::clone(&snapshot));

        let mut history = self.history.write().await;
        if history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(Arc::clone(&snapshot));

        Ok(snapshot)
    }

    pub async fn latest(&self) -> Option<Arc<MemorySnapshot>> {
        self.latest.read().await.clone()
    }

    /// Most recent `count` snapshots, newest first.
    pub async fn history(&self, count: usize) -> Vec<Arc<MemorySnapshot>> {
        let history = self.history.read().await;
        history.iter().rev().take(count).cloned().collect()
    }

    pub async fn stats(&self) -> MonitorStats {
        let history = self.history.read().await;

        if history.is_empty() {
            return MonitorStats::default();
        }

        let loads: Vec<u32> = history.iter().map(|s| s.physical.used.percentage).collect();
        let avg_load = loads.iter().sum::<u32>() as f64 / loads.len() as f64;
        let max_load = *loads.iter().max().unwrap_or(&0);
        let min_load = *loads.iter().min().unwrap_or(&0);

        MonitorStats {
            sample_count: history.len(),
            avg_memory_load: avg_load,
            max_memory_load: max_load,
            min_memory_load: min_load,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct MonitorStats {
    pub sample_count: usize,
    pub avg_memory_load: f64,
    pub max_memory_load: u32,
    pub min_memory_load: u32,
}
