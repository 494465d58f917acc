//! Core optimizer logic

pub mod areas;
pub mod capability;
pub mod config;
pub mod memory;
pub mod operations;
pub mod optimizer;
pub mod scheduler;
