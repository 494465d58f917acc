//! Memory monitoring

pub mod realtime;

pub use realtime::{MemoryMonitor, MonitorStats};
