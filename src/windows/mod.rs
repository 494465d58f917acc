//! Windows Memory Management APIs
//!
//! `ffi` and `process` build everywhere; the rest needs Win32.

pub mod ffi;
pub mod process;

#[cfg(windows)]
pub mod handle;
#[cfg(windows)]
pub mod memory;
#[cfg(windows)]
mod ntdll;
#[cfg(windows)]
pub mod volume;

#[cfg(windows)]
pub use memory::WindowsMemoryApi;
