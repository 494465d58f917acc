//! Memory reclamation operations
//!
//! Each operation follows the same shape: check the capability, elevate the
//! privilege it needs, issue its OS request. Nothing here retries. Per-resource
//! failures (one process, one volume) are collected and reported once after the
//! whole pass.

use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use super::areas::{MemoryArea, MemoryAreas};
use super::capability::Capabilities;
use super::config::ExclusionList;
use crate::platform::{MemoryApi, PlatformError};
use crate::security::privileges::{Privilege, PrivilegeElevator};
use crate::windows::ffi::{MemoryListCommand, SystemInformationRequest};

/// One reclamation operation group, in the order the orchestrator runs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    ProcessesWorkingSet,
    SystemWorkingSet,
    ModifiedPageList,
    StandbyList { low_priority: bool },
    CombinedPageList,
    ModifiedFileCache,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::ProcessesWorkingSet => "Processes Working Set",
            Operation::SystemWorkingSet => "System Working Set",
            Operation::ModifiedPageList => "Modified Page List",
            Operation::StandbyList { low_priority: false } => "Standby List",
            Operation::StandbyList { low_priority: true } => "Standby List (Low Priority)",
            Operation::CombinedPageList => "Combined Page List",
            Operation::ModifiedFileCache => "Modified File Cache",
        }
    }

    pub fn area(&self) -> MemoryArea {
        match self {
            Operation::ProcessesWorkingSet => MemoryArea::ProcessesWorkingSet,
            Operation::SystemWorkingSet => MemoryArea::SystemWorkingSet,
            Operation::ModifiedPageList => MemoryArea::ModifiedPageList,
            Operation::StandbyList { low_priority: false } => MemoryArea::StandbyList,
            Operation::StandbyList { low_priority: true } => MemoryArea::StandbyListLowPriority,
            Operation::CombinedPageList => MemoryArea::CombinedPageList,
            Operation::ModifiedFileCache => MemoryArea::ModifiedFileCache,
        }
    }

    /// Token privilege acquired before the OS request, if any.
    pub fn required_privilege(&self) -> Option<Privilege> {
        match self {
            Operation::ProcessesWorkingSet => Some(Privilege::Debug),
            Operation::SystemWorkingSet => Some(Privilege::IncreaseQuota),
            Operation::ModifiedPageList | Operation::StandbyList { .. } | Operation::CombinedPageList => {
                Some(Privilege::ProfileSingleProcess)
            }
            Operation::ModifiedFileCache => None,
        }
    }

    /// Operation groups implied by `areas`, in run order.
    ///
    /// Both standby variants collapse into one group; the normal one wins.
    pub fn plan(areas: MemoryAreas) -> Vec<Operation> {
        let areas = areas.normalized();
        let mut plan = Vec::with_capacity(areas.len());

        if areas.contains(MemoryArea::ProcessesWorkingSet) {
            plan.push(Operation::ProcessesWorkingSet);
        }
        if areas.contains(MemoryArea::SystemWorkingSet) {
            plan.push(Operation::SystemWorkingSet);
        }
        if areas.contains(MemoryArea::ModifiedPageList) {
            plan.push(Operation::ModifiedPageList);
        }
        if areas.intersects(MemoryAreas::STANDBY) {
            plan.push(Operation::StandbyList {
                low_priority: !areas.contains(MemoryArea::StandbyList),
            });
        }
        if areas.contains(MemoryArea::CombinedPageList) {
            plan.push(Operation::CombinedPageList);
        }
        if areas.contains(MemoryArea::ModifiedFileCache) {
            plan.push(Operation::ModifiedFileCache);
        }
        plan
    }

    pub fn is_supported(&self, capabilities: &Capabilities) -> bool {
        capabilities.is_area_supported(self.area())
    }

    /// Run the operation once.
    pub fn run(&self, ctx: &OperationContext<'_>) -> Result<OperationSummary, OperationError> {
        if !self.is_supported(ctx.capabilities) {
            return Err(OperationError::Unsupported { operation: self.name() });
        }

        if let Some(privilege) = self.required_privilege() {
            if !PrivilegeElevator::new(ctx.api).elevate(privilege) {
                return Err(OperationError::PrivilegeDenied { privilege });
            }
        }

        match self {
            Operation::ProcessesWorkingSet => self.trim_processes(ctx),
            Operation::SystemWorkingSet => {
                ctx.api
                    .set_system_information(SystemInformationRequest::FileCacheUnlimited)
                    .map_err(|e| self.os_error(e))?;
                ctx.api.flush_system_file_cache().map_err(|e| self.os_error(e))?;
                Ok(OperationSummary::default())
            }
            Operation::ModifiedPageList => {
                self.memory_list(ctx, MemoryListCommand::FlushModifiedList)
            }
            Operation::StandbyList { low_priority } => {
                let command = if *low_priority {
                    MemoryListCommand::PurgeLowPriorityStandbyList
                } else {
                    MemoryListCommand::PurgeStandbyList
                };
                self.memory_list(ctx, command)
            }
            Operation::CombinedPageList => {
                ctx.api
                    .set_system_information(SystemInformationRequest::CombinePhysicalMemory)
                    .map_err(|e| self.os_error(e))?;
                Ok(OperationSummary::default())
            }
            Operation::ModifiedFileCache => self.flush_volumes(ctx),
        }
    }

    fn os_error(&self, source: PlatformError) -> OperationError {
        OperationError::Os { operation: self.name(), source }
    }

    fn memory_list(
        &self,
        ctx: &OperationContext<'_>,
        command: MemoryListCommand,
    ) -> Result<OperationSummary, OperationError> {
        ctx.api
            .set_system_information(SystemInformationRequest::MemoryList(command))
            .map_err(|e| self.os_error(e))?;
        Ok(OperationSummary::default())
    }

    fn trim_processes(&self, ctx: &OperationContext<'_>) -> Result<OperationSummary, OperationError> {
        let processes = ctx.api.processes().map_err(|e| self.os_error(e))?;
        let mut summary = OperationSummary::default();
        let mut failures = Vec::new();

        for process in processes {
            if ctx.exclusions.contains(&process.name) {
                summary.processes_excluded += 1;
                continue;
            }

            match ctx.api.empty_working_set(process.pid) {
                Ok(()) => summary.processes_trimmed += 1,
                Err(e) if e.is_access_denied() || e.is_process_gone() => {
                    summary.processes_skipped += 1;
                }
                Err(e) => failures.push(ResourceFailure::new(process.name, &e)),
            }
        }

        debug!(
            "Trimmed {} processes ({} excluded, {} skipped, {} failed)",
            summary.processes_trimmed,
            summary.processes_excluded,
            summary.processes_skipped,
            failures.len()
        );

        self.finish(summary, failures)
    }

    fn flush_volumes(&self, ctx: &OperationContext<'_>) -> Result<OperationSummary, OperationError> {
        let mut summary = OperationSummary::default();
        let mut failures = Vec::new();

        for root in ctx.api.fixed_volumes() {
            let Some(mut volume) = ctx.api.open_volume(&root) else {
                debug!("Skipping volume {}: cannot open", root);
                continue;
            };

            if ctx.capabilities.can_reset_write_order() {
                if let Err(e) = volume.reset_write_order() {
                    debug!("Reset write order on {} failed: {}", root, e);
                }
            }

            if ctx.capabilities.can_discard_volume_cache() {
                if let Err(e) = volume.discard_cache() {
                    debug!("Discard volume cache on {} failed: {}", root, e);
                }
            }

            match volume.flush() {
                Ok(()) => summary.volumes_flushed += 1,
                Err(e) => failures.push(ResourceFailure::new(volume.root(), &e)),
            }
        }

        self.finish(summary, failures)
    }

    fn finish(
        &self,
        summary: OperationSummary,
        failures: Vec<ResourceFailure>,
    ) -> Result<OperationSummary, OperationError> {
        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(OperationError::Partial { operation: self.name(), failures })
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything an operation needs, handed in per call.
pub struct OperationContext<'a> {
    pub api: &'a dyn MemoryApi,
    pub capabilities: &'a Capabilities,
    pub exclusions: &'a ExclusionList,
}

/// Counters from a successful run. Zero for single-call operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    pub processes_trimmed: usize,
    pub processes_excluded: usize,
    /// Access denied or exited before the trim
    pub processes_skipped: usize,
    pub volumes_flushed: usize,
}

/// A process or volume the operation could not handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceFailure {
    pub resource: String,
    pub message: String,
}

impl ResourceFailure {
    pub fn new(resource: impl Into<String>, error: &PlatformError) -> Self {
        Self { resource: resource.into(), message: error.to_string() }
    }
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.message)
    }
}

fn join_failures(failures: &[ResourceFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join(" | ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("The {operation} optimization is not supported on this operating system version")]
    Unsupported { operation: &'static str },

    #[error("This operation requires administrator privileges ({privilege})")]
    PrivilegeDenied { privilege: Privilege },

    #[error("{source}")]
    Os {
        operation: &'static str,
        #[source]
        source: PlatformError,
    },

    #[error("{}", join_failures(.failures))]
    Partial {
        operation: &'static str,
        failures: Vec<ResourceFailure>,
    },
}

impl OperationError {
    /// True when nothing was attempted (unsupported OS or missing privilege).
    pub fn could_not_start(&self) -> bool {
        matches!(self, OperationError::Unsupported { .. } | OperationError::PrivilegeDenied { .. })
    }
}
