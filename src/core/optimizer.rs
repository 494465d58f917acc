//! Optimization orchestrator
//!
//! Runs the selected operation groups one after another in a fixed order,
//! reporting progress before each group and once more at the end. A failing
//! group is logged and the run moves on; nothing escapes `optimize`.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::areas::{MemoryAreas, OptimizationReason};
use super::capability::Capabilities;
use super::config::ExclusionList;
use super::operations::{Operation, OperationContext, OperationError, OperationSummary};
use crate::platform::MemoryApi;

/// Label of the trailing step.
pub const FINAL_STEP_LABEL: &str = "Optimized";

/// Progress notification, sent before each group and after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate<'a> {
    pub step: u8,
    pub total: u8,
    pub label: &'a str,
}

impl ProgressUpdate<'_> {
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (f64::from(self.step) * 100.0 / f64::from(self.total)).round() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    /// Nothing applicable was requested
    Idle,
    Completed,
    PartiallyFailed,
}

#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub elapsed: Duration,
    pub result: Result<OperationSummary, OperationError>,
}

impl OperationOutcome {
    pub fn log_line(&self) -> String {
        match &self.result {
            Ok(_) => format!(
                "{} (Optimized) ({:.1} seconds)",
                self.operation.name(),
                self.elapsed.as_secs_f64()
            ),
            Err(e) => format!("{} (Error: {})", self.operation.name(), e),
        }
    }
}

/// What one `optimize` call did.
#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub reason: OptimizationReason,
    pub requested: MemoryAreas,
    pub outcomes: Vec<OperationOutcome>,
    /// Time spent in groups that succeeded
    pub elapsed: Duration,
    pub total_steps: u8,
    pub info_log: Option<String>,
    pub error_log: Option<String>,
}

impl OptimizationReport {
    fn idle(reason: OptimizationReason, requested: MemoryAreas) -> Self {
        Self {
            reason,
            requested,
            outcomes: Vec::new(),
            elapsed: Duration::ZERO,
            total_steps: 0,
            info_log: None,
            error_log: None,
        }
    }

    pub fn state(&self) -> RunState {
        if self.outcomes.is_empty() {
            RunState::Idle
        } else if self.outcomes.iter().any(|o| o.result.is_err()) {
            RunState::PartiallyFailed
        } else {
            RunState::Completed
        }
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

/// The optimization engine.
///
/// Not reentrant: callers serialize runs (see `service::BusyFlag`).
pub struct Optimizer {
    api: Arc<dyn MemoryApi>,
    capabilities: Capabilities,
}

impl Optimizer {
    pub fn new(api: Arc<dyn MemoryApi>) -> Self {
        let capabilities = Capabilities::probe(api.os_version(), api.is_64bit());
        debug!(
            "OS {} ({}-bit), supported areas: {}",
            capabilities.os_version(),
            if capabilities.is_64bit() { 64 } else { 32 },
            capabilities.supported_areas()
        );
        Self { api, capabilities }
    }

    pub fn api(&self) -> &Arc<dyn MemoryApi> {
        &self.api
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Run every supported group in `areas`.
    ///
    /// Unsupported areas are dropped before the run. An empty selection is a
    /// no-op: no OS calls, no progress, no log entries.
    pub fn optimize<F>(
        &self,
        areas: MemoryAreas,
        reason: OptimizationReason,
        exclusions: &ExclusionList,
        mut progress: F,
    ) -> OptimizationReport
    where
        F: FnMut(ProgressUpdate<'_>),
    {
        let applicable = self.capabilities.filter(areas.normalized());
        let plan = Operation::plan(applicable);
        if plan.is_empty() {
            debug!("Nothing to optimize (requested: {})", areas);
            return OptimizationReport::idle(reason, areas);
        }

        let total = plan.len() as u8 + 1;
        let ctx = OperationContext {
            api: self.api.as_ref(),
            capabilities: &self.capabilities,
            exclusions,
        };

        let mut report = OptimizationReport::idle(reason, areas);
        report.total_steps = total;

        for (index, operation) in plan.into_iter().enumerate() {
            progress(ProgressUpdate { step: index as u8 + 1, total, label: operation.name() });
            debug!("Optimizing {}", operation);

            let started = Instant::now();
            let result = operation.run(&ctx);
            let elapsed = started.elapsed();
            if result.is_ok() {
                report.elapsed += elapsed;
            }
            report.outcomes.push(OperationOutcome { operation, elapsed, result });
        }

        report.info_log = self.info_entry(&report);
        report.error_log = self.error_entry(&report);

        if let Some(entry) = &report.info_log {
            info!("{}", entry);
        }
        if let Some(entry) = &report.error_log {
            error!("{}", entry);
        }

        if let Err(e) = self.api.release_own_memory() {
            debug!("Releasing own memory failed: {}", e);
        }

        progress(ProgressUpdate { step: total, total, label: FINAL_STEP_LABEL });
        report
    }

    fn info_entry(&self, report: &OptimizationReport) -> Option<String> {
        let lines: Vec<String> = report.succeeded().map(OperationOutcome::log_line).collect();
        if lines.is_empty() {
            return None;
        }
        Some(format!(
            "MEMORY AREAS ({:.1} seconds)\n\nOptimization start reason: {}\n{}",
            report.elapsed.as_secs_f64(),
            report.reason,
            lines.join("\n")
        ))
    }

    fn error_entry(&self, report: &OptimizationReport) -> Option<String> {
        let lines: Vec<String> = report.failed().map(OperationOutcome::log_line).collect();
        if lines.is_empty() {
            return None;
        }
        Some(format!("MEMORY AREAS\n\n{}", lines.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::areas::MemoryArea;
    use crate::core::capability::OsVersion;
    use crate::platform::mock::{MockCall, MockMemoryApi};
    use crate::platform::PlatformError;
    use crate::security::privileges::Privilege;
    use crate::windows::ffi::{MemoryListCommand, SystemInformationRequest};

    fn collect(
        optimizer: &Optimizer,
        areas: MemoryAreas,
        exclusions: &ExclusionList,
    ) -> (OptimizationReport, Vec<(u8, u8, String)>) {
        let mut steps = Vec::new();
        let report = optimizer.optimize(areas, OptimizationReason::Manual, exclusions, |p| {
            steps.push((p.step, p.total, p.label.to_string()))
        });
        (report, steps)
    }

    #[test]
    fn test_empty_selection_is_noop() {
        let api = Arc::new(MockMemoryApi::windows_10());
        let optimizer = Optimizer::new(api.clone());
        let (report, steps) = collect(&optimizer, MemoryAreas::NONE, &ExclusionList::new());

        assert!(steps.is_empty());
        assert!(api.calls().is_empty());
        assert_eq!(report.state(), RunState::Idle);
        assert!(report.info_log.is_none());
        assert!(report.error_log.is_none());
    }

    #[test]
    fn test_unsupported_area_is_filtered() {
        let api = Arc::new(MockMemoryApi::new(OsVersion::new(6, 1, 7601)));
        let optimizer = Optimizer::new(api.clone());
        let areas = MemoryArea::CombinedPageList | MemoryArea::ModifiedPageList;
        let (report, steps) = collect(&optimizer, areas, &ExclusionList::new());

        assert_eq!(
            steps,
            vec![
                (1, 2, "Modified Page List".to_string()),
                (2, 2, "Optimized".to_string()),
            ]
        );
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(
            api.system_requests(),
            vec![SystemInformationRequest::MemoryList(MemoryListCommand::FlushModifiedList)]
        );
    }

    #[test]
    fn test_only_unsupported_areas_is_noop() {
        let api = Arc::new(MockMemoryApi::new(OsVersion::WINDOWS_XP));
        let optimizer = Optimizer::new(api.clone());
        let (report, steps) = collect(&optimizer, MemoryArea::StandbyList.into(), &ExclusionList::new());
        assert!(steps.is_empty());
        assert_eq!(report.state(), RunState::Idle);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn test_failure_does_not_stop_later_groups() {
        let api = Arc::new(MockMemoryApi::windows_10().fail_system_information(
            SystemInformationRequest::MemoryList(MemoryListCommand::FlushModifiedList),
            PlatformError::os(1234, "Synthetic failure"),
        ));
        let optimizer = Optimizer::new(api.clone());
        let areas = MemoryArea::ModifiedPageList | MemoryArea::StandbyList | MemoryArea::CombinedPageList;
        let (report, steps) = collect(&optimizer, areas, &ExclusionList::new());

        assert_eq!(steps.len(), 4);
        assert_eq!(report.state(), RunState::PartiallyFailed);
        assert_eq!(report.succeeded().count(), 2);

        let errors = report.error_log.as_deref().unwrap();
        assert!(errors.starts_with("MEMORY AREAS\n\n"));
        assert!(errors.contains("Modified Page List (Error: Synthetic failure (error 1234))"));

        let info = report.info_log.as_deref().unwrap();
        assert!(info.contains("Standby List (Optimized)"));
        assert!(info.contains("Combined Page List (Optimized)"));
        assert!(!info.contains("Modified Page List"));
    }

    #[test]
    fn test_file_cache_flush_failure_does_not_stop_later_groups() {
        let api = Arc::new(
            MockMemoryApi::windows_10().fail_file_cache_flush(PlatformError::os(1450, "Insufficient system resources")),
        );
        let optimizer = Optimizer::new(api.clone());
        let areas = MemoryArea::SystemWorkingSet | MemoryArea::ModifiedPageList;
        let (report, steps) = collect(&optimizer, areas, &ExclusionList::new());

        assert_eq!(steps.len(), 3);
        assert_eq!(report.state(), RunState::PartiallyFailed);
        assert_eq!(
            api.system_requests(),
            vec![
                SystemInformationRequest::FileCacheUnlimited,
                SystemInformationRequest::MemoryList(MemoryListCommand::FlushModifiedList),
            ]
        );

        let errors = report.error_log.as_deref().unwrap();
        assert!(errors.contains("System Working Set (Error: Insufficient system resources (error 1450))"));
        assert!(report.info_log.as_deref().unwrap().contains("Modified Page List (Optimized)"));
    }

    #[test]
    fn test_all_groups_fail_still_finalizes() {
        let api = Arc::new(MockMemoryApi::windows_10().deny_privilege(Privilege::ProfileSingleProcess));
        let optimizer = Optimizer::new(api.clone());
        let (report, steps) = collect(&optimizer, MemoryArea::StandbyList.into(), &ExclusionList::new());

        assert_eq!(steps.last(), Some(&(2, 2, "Optimized".to_string())));
        assert!(report.info_log.is_none());
        assert_eq!(
            report.error_log.as_deref(),
            Some("MEMORY AREAS\n\nStandby List (Error: This operation requires administrator privileges (SeProfileSingleProcessPrivilege))")
        );
        assert!(api.calls().contains(&MockCall::ReleaseOwnMemory));
    }

    #[test]
    fn test_release_failure_is_swallowed() {
        let api = Arc::new(
            MockMemoryApi::windows_10().fail_release(PlatformError::os(5, "Access is denied.")),
        );
        let optimizer = Optimizer::new(api);
        let (report, steps) = collect(&optimizer, MemoryArea::CombinedPageList.into(), &ExclusionList::new());
        assert_eq!(report.state(), RunState::Completed);
        assert_eq!(steps.len(), 2);
    }

    #[test]
    fn test_standby_variants_run_once() {
        let api = Arc::new(MockMemoryApi::windows_10());
        let optimizer = Optimizer::new(api.clone());
        let areas = MemoryArea::StandbyList | MemoryArea::StandbyListLowPriority;
        let (report, steps) = collect(&optimizer, areas, &ExclusionList::new());

        assert_eq!(report.total_steps, 2);
        assert_eq!(steps[0].2, "Standby List");
        assert_eq!(
            api.system_requests(),
            vec![SystemInformationRequest::MemoryList(MemoryListCommand::PurgeStandbyList)]
        );
    }

    #[test]
    fn test_end_to_end_processes_and_standby() {
        let mut api = MockMemoryApi::windows_10();
        for pid in 1..=10u32 {
            let name = match pid {
                3 => "Notepad.exe".to_string(),
                7 => "steam.exe".to_string(),
                _ => format!("app{}.exe", pid),
            };
            api = api.with_process(pid, &name);
        }
        let api = Arc::new(api.fail_trim(5, PlatformError::os(5, "Access is denied.")));
        let exclusions: ExclusionList = ["notepad", "Steam.exe"].into_iter().collect();
        let optimizer = Optimizer::new(api.clone());

        let areas = MemoryArea::ProcessesWorkingSet | MemoryArea::StandbyList;
        let (report, steps) = collect(&optimizer, areas, &exclusions);

        assert_eq!(
            steps,
            vec![
                (1, 3, "Processes Working Set".to_string()),
                (2, 3, "Standby List".to_string()),
                (3, 3, "Optimized".to_string()),
            ]
        );
        assert_eq!(report.state(), RunState::Completed);
        assert!(report.error_log.is_none());

        let info = report.info_log.as_deref().unwrap();
        assert!(info.starts_with("MEMORY AREAS ("));
        assert!(info.contains("Optimization start reason: Manual"));
        assert_eq!(info.matches("(Optimized)").count(), 2);

        let summary = report.outcomes[0].result.as_ref().unwrap();
        assert_eq!(summary.processes_trimmed, 7);
        assert_eq!(summary.processes_excluded, 2);
        assert_eq!(summary.processes_skipped, 1);
        assert_eq!(api.trimmed_pids().len(), 8);
    }

    #[test]
    fn test_progress_percentage() {
        let update = ProgressUpdate { step: 1, total: 3, label: "x" };
        assert_eq!(update.percentage(), 33);
        assert_eq!(ProgressUpdate { step: 2, total: 3, label: "x" }.percentage(), 67);
        assert_eq!(ProgressUpdate { step: 3, total: 3, label: "x" }.percentage(), 100);
        assert_eq!(ProgressUpdate { step: 0, total: 0, label: "x" }.percentage(), 0);
    }
}
