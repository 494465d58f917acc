//! Owned Win32 handles

use windows::Win32::Foundation::{CloseHandle, HANDLE};

/// Closes the wrapped handle on drop.
#[derive(Debug)]
pub struct OwnedHandle(HANDLE);

impl OwnedHandle {
    /// Take ownership of `handle`. Pseudo handles must not be wrapped.
    pub fn new(handle: HANDLE) -> Self {
        Self(handle)
    }

    pub fn raw(&self) -> HANDLE {
        self.0
    }
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}
