//! Privilege management

use std::fmt;
use tracing::warn;

use crate::platform::MemoryApi;

/// Token privileges required by the reclamation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Privilege {
    /// Adjust the memory of processes owned by other accounts
    Debug,
    /// Adjust memory quotas, including the system file cache bounds
    IncreaseQuota,
    /// Issue memory list commands to the memory manager
    ProfileSingleProcess,
}

impl Privilege {
    pub const fn name(&self) -> &'static str {
        match self {
            Privilege::Debug => "SeDebugPrivilege",
            Privilege::IncreaseQuota => "SeIncreaseQuotaPrivilege",
            Privilege::ProfileSingleProcess => "SeProfileSingleProcessPrivilege",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acquires privileges on the current process token.
///
/// Every call re-requests the privilege: enabling is idempotent and the OS
/// keeps it for the rest of the process lifetime, so no state is cached here.
pub struct PrivilegeElevator<'a> {
    api: &'a dyn MemoryApi,
}

impl<'a> PrivilegeElevator<'a> {
    pub fn new(api: &'a dyn MemoryApi) -> Self {
        Self { api }
    }

    /// Single attempt, no retries. `false` means lookup or enable failed.
    pub fn elevate(&self, privilege: Privilege) -> bool {
        let enabled = self.api.enable_privilege(privilege.name());
        if !enabled {
            warn!("Failed to enable {}", privilege);
        }
        enabled
    }
}

/// Enable a privilege on the process token with `AdjustTokenPrivileges`.
#[cfg(windows)]
pub fn enable_token_privilege(name: &str) -> Result<(), crate::platform::PlatformError> {
    use crate::platform::PlatformError;
    use crate::windows::ffi::error_code::ERROR_NOT_ALL_ASSIGNED;
    use windows::core::{HSTRING, PCWSTR};
    use crate::windows::handle::OwnedHandle;
    use windows::Win32::Foundation::{HANDLE, LUID};
    use windows::Win32::Security::{
        AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
        TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token = HANDLE::default();
        OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut token)?;
        let token = OwnedHandle::new(token);

        let mut luid = LUID::default();
        LookupPrivilegeValueW(PCWSTR::null(), &HSTRING::from(name), &mut luid)?;

        let state = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES { Luid: luid, Attributes: SE_PRIVILEGE_ENABLED }],
        };
        AdjustTokenPrivileges(token.raw(), false, Some(&state as *const _), 0, None, None)?;

        // AdjustTokenPrivileges succeeds even when the account lacks the right
        let last = PlatformError::last_os_error();
        if last.code() == Some(ERROR_NOT_ALL_ASSIGNED) {
            return Err(last);
        }
        Ok(())
    }
}
