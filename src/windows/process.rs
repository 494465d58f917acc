//! Process enumeration and working set trimming

use sysinfo::{ProcessesToUpdate, System};

use crate::platform::ProcessEntry;

/// List running processes with their image names. The idle process (pid 0) is left out.
pub fn list_processes() -> Vec<ProcessEntry> {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    sys.processes()
        .iter()
        .filter(|(pid, _)| pid.as_u32() != 0)
        .map(|(pid, p)| ProcessEntry::new(pid.as_u32(), p.name().to_string_lossy()))
        .collect()
}

/// Ask the OS to trim a process working set.
#[cfg(windows)]
pub fn trim_working_set(pid: u32) -> crate::platform::PlatformResult<()> {
    use windows::Win32::System::ProcessStatus::EmptyWorkingSet;
    use windows::Win32::System::Threading::{
        OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_SET_QUOTA,
    };

    use super::handle::OwnedHandle;

    unsafe {
        let handle = OwnedHandle::new(OpenProcess(
            PROCESS_QUERY_LIMITED_INFORMATION | PROCESS_SET_QUOTA,
            false,
            pid,
        )?);
        EmptyWorkingSet(handle.raw())?;
    }
    Ok(())
}

/// Trim the working set of the calling process.
#[cfg(windows)]
pub fn trim_own_working_set() -> crate::platform::PlatformResult<()> {
    use windows::Win32::System::ProcessStatus::EmptyWorkingSet;
    use windows::Win32::System::Threading::GetCurrentProcess;

    unsafe { EmptyWorkingSet(GetCurrentProcess())? };
    Ok(())
}
