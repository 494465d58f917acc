//! Memory Optimization Engine
//!
//! Sequences a fixed set of privilege-gated OS memory reclamation operations,
//! tracks progress and partial failure across them, and reports an aggregate
//! result.
//!
//! ## Features
//!
//! - **Reclamation Operations**: process and system working sets, modified and
//!   standby page lists, page combining, per-volume file cache flush
//! - **Capability Probe**: areas filtered by OS version before a run
//! - **Orchestrator**: fixed ordering, progress callbacks, aggregated logs
//! - **Monitoring**: polled memory snapshots with bounded history
//! - **Service**: busy flag, scheduled and usage-triggered runs
//!
//! ## Safety
//!
//! - Excluded processes are never trimmed
//! - One failing operation never aborts the run
//! - Native handles are closed on every exit path

pub mod core;
pub mod monitor;
pub mod platform;
pub mod security;
pub mod service;
pub mod windows;

// Re-exports
pub use crate::core::areas::{MemoryArea, MemoryAreas, OptimizationReason};
pub use crate::core::capability::{Capabilities, OsVersion};
pub use crate::core::config::{ConfigError, ExclusionList, OptimizerConfig, Priority};
pub use crate::core::memory::{read_snapshot, MemorySnapshot, MemoryStats, ReleasedMemory};
pub use crate::core::operations::{Operation, OperationError};
pub use crate::core::optimizer::{OptimizationReport, Optimizer, ProgressUpdate, RunState};
pub use monitor::MemoryMonitor;
pub use platform::{create_platform, MemoryApi, PlatformError, PlatformResult};
pub use security::privileges::{Privilege, PrivilegeElevator};
pub use service::{BusyFlag, OptimizationService, ServiceOutcome};
