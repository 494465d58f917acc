//! Background service: busy flag, one-shot runs and the daemon loop

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::areas::{MemoryAreas, OptimizationReason};
use crate::core::config::OptimizerConfig;
use crate::core::memory::{read_snapshot, MemorySnapshot, ReleasedMemory};
use crate::core::optimizer::{OptimizationReport, Optimizer, ProgressUpdate};
use crate::core::scheduler::AutoOptimizationPolicy;
use crate::monitor::MemoryMonitor;
use crate::platform::MemoryApi;

/// How often the daemon asks the policy whether a run is due.
pub const POLICY_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Set while an optimization runs. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when a run is already active.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Clears the busy flag on drop.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Result of one service-level run.
#[derive(Debug, Clone)]
pub struct ServiceOutcome {
    pub report: OptimizationReport,
    pub before: Option<MemorySnapshot>,
    pub after: Option<MemorySnapshot>,
    /// Present when both snapshot reads succeeded
    pub released: Option<ReleasedMemory>,
    pub notification: Option<String>,
}

pub struct OptimizationService {
    optimizer: Optimizer,
    config: OptimizerConfig,
    busy: BusyFlag,
}

impl OptimizationService {
    pub fn new(api: Arc<dyn MemoryApi>, config: OptimizerConfig) -> Self {
        Self {
            optimizer: Optimizer::new(api),
            config,
            busy: BusyFlag::new(),
        }
    }

    pub fn optimizer(&self) -> &Optimizer {
        &self.optimizer
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn busy(&self) -> &BusyFlag {
        &self.busy
    }

    /// Configured areas this OS can actually optimize.
    pub fn effective_areas(&self) -> MemoryAreas {
        self.config.effective_areas(self.optimizer.capabilities())
    }

    /// Run the configured areas once. Returns `None` if a run is already active.
    pub fn optimize<F>(&self, reason: OptimizationReason, progress: F) -> Option<ServiceOutcome>
    where
        F: FnMut(ProgressUpdate<'_>),
    {
        let Some(_guard) = self.busy.try_acquire() else {
            debug!("Optimization already running, skipping {} request", reason);
            return None;
        };

        let api = self.optimizer.api().as_ref();
        if let Err(e) = api.apply_priority(self.config.run_on_priority) {
            debug!("Could not apply {:?} priority: {}", self.config.run_on_priority, e);
        }

        let before = snapshot_or_warn(api, "before");
        let report = self.optimizer.optimize(
            self.effective_areas(),
            reason,
            &self.config.process_exclusion_list,
            progress,
        );
        let after = snapshot_or_warn(api, "after");

        let released = match (&before, &after) {
            (Some(before), Some(after)) => Some(ReleasedMemory::between(before, after)),
            _ => None,
        };

        let notification = released
            .filter(|_| self.config.show_optimization_notifications)
            .filter(|_| report.succeeded().next().is_some())
            .map(|released| released.summary(self.config.show_virtual_memory));
        if let Some(message) = &notification {
            info!("{}", message.replace("\n\n", ": "));
        }

        Some(ServiceOutcome { report, before, after, released, notification })
    }
}

fn snapshot_or_warn(api: &dyn MemoryApi, when: &str) -> Option<MemorySnapshot> {
    match read_snapshot(api) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!("Memory snapshot {} optimization failed: {}", when, e);
            None
        }
    }
}

/// Poll memory and run automatic optimizations until Ctrl-C.
pub async fn run_daemon(service: Arc<OptimizationService>, monitor: Arc<MemoryMonitor>) {
    run_daemon_until(service, monitor, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
        }
    })
    .await
}

/// Daemon loop that stops when `shutdown` completes.
///
/// A run in progress at shutdown is awaited, never cancelled.
pub async fn run_daemon_until<S>(service: Arc<OptimizationService>, monitor: Arc<MemoryMonitor>, shutdown: S)
where
    S: Future<Output = ()>,
{
    let mut policy = AutoOptimizationPolicy::new(service.config(), service.effective_areas(), Instant::now());
    if policy.is_enabled() {
        info!("Automatic optimization enabled for: {}", service.effective_areas());
    } else {
        info!("Automatic optimization disabled, monitoring only");
    }

    let mut poll = tokio::time::interval(monitor.interval());
    let mut check = tokio::time::interval(POLICY_CHECK_INTERVAL);
    let mut in_flight: Option<JoinHandle<Option<ServiceOutcome>>> = None;

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
            _ = poll.tick() => {
                if let Ok(snapshot) = monitor.refresh().await {
                    debug!("{}", snapshot.physical);
                }
            }
            _ = check.tick() => {
                if service.busy().is_busy() {
                    continue;
                }
                let snapshot = monitor.latest().await;
                if let Some(reason) = policy.evaluate(Instant::now(), snapshot.as_deref()) {
                    info!("Starting {} optimization", reason);
                    let service = Arc::clone(&service);
                    in_flight = Some(tokio::task::spawn_blocking(move || {
                        service.optimize(reason, |p| debug!("[{}%] {}", p.percentage(), p.label))
                    }));
                }
            }
        }
    }

    if let Some(handle) = in_flight.take() {
        if !handle.is_finished() {
            info!("Waiting for the running optimization to finish");
        }
        if let Err(e) = handle.await {
            warn!("Optimization worker failed: {}", e);
        }
    }
}
