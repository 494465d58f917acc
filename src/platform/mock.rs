//! Scripted `MemoryApi` for tests
//!
//! Every call is recorded so tests can assert on order and arguments.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{
    MemoryApi, MemoryCounters, PlatformError, PlatformResult, ProcessEntry, VolumeHandle,
};
use crate::core::capability::OsVersion;
use crate::core::config::Priority;
use crate::security::privileges::Privilege;
use crate::windows::ffi::SystemInformationRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    EnablePrivilege(String),
    Processes,
    EmptyWorkingSet(u32),
    SetSystemInformation(SystemInformationRequest),
    FlushSystemFileCache,
    OpenVolume(String),
    ResetWriteOrder(String),
    DiscardCache(String),
    FlushVolume(String),
    ReleaseOwnMemory,
    ApplyPriority(Priority),
}

#[derive(Debug, Clone, Default)]
struct MockVolume {
    root: String,
    openable: bool,
    reset_failure: Option<PlatformError>,
    discard_failure: Option<PlatformError>,
    flush_failure: Option<PlatformError>,
}

type CallLog = Arc<Mutex<Vec<MockCall>>>;

pub struct MockMemoryApi {
    os: OsVersion,
    is_64bit: bool,
    counters: Mutex<VecDeque<PlatformResult<MemoryCounters>>>,
    denied: HashSet<String>,
    processes: Vec<ProcessEntry>,
    process_list_failure: Option<PlatformError>,
    trim_failures: HashMap<u32, PlatformError>,
    system_failures: HashMap<SystemInformationRequest, PlatformError>,
    file_cache_flush_failure: Option<PlatformError>,
    volumes: Vec<MockVolume>,
    release_failure: Option<PlatformError>,
    calls: CallLog,
}

impl MockMemoryApi {
    pub fn new(os: OsVersion) -> Self {
        Self {
            os,
            is_64bit: true,
            counters: Mutex::new(VecDeque::from([Ok(MemoryCounters {
                memory_load: None,
                total_physical: 16 << 30,
                available_physical: 8 << 30,
                total_virtual: 24 << 30,
                available_virtual: 12 << 30,
            })])),
            denied: HashSet::new(),
            processes: Vec::new(),
            process_list_failure: None,
            trim_failures: HashMap::new(),
            system_failures: HashMap::new(),
            file_cache_flush_failure: None,
            volumes: Vec::new(),
            release_failure: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn windows_10() -> Self {
        Self::new(OsVersion::new(10, 0, 19045))
    }

    pub fn with_64bit(mut self, is_64bit: bool) -> Self {
        self.is_64bit = is_64bit;
        self
    }

    /// Every read returns these counters.
    pub fn with_counters(self, counters: MemoryCounters) -> Self {
        self.with_counter_sequence(vec![Ok(counters)])
    }

    /// Reads consume the sequence in order; the last entry repeats.
    pub fn with_counter_sequence(self, sequence: Vec<PlatformResult<MemoryCounters>>) -> Self {
        *self.counters.lock().unwrap() = sequence.into();
        self
    }

    pub fn deny_privilege(mut self, privilege: Privilege) -> Self {
        self.denied.insert(privilege.name().to_string());
        self
    }

    pub fn with_process(mut self, pid: u32, name: &str) -> Self {
        self.processes.push(ProcessEntry::new(pid, name));
        self
    }

    pub fn fail_process_list(mut self, error: PlatformError) -> Self {
        self.process_list_failure = Some(error);
        self
    }

    pub fn fail_trim(mut self, pid: u32, error: PlatformError) -> Self {
        self.trim_failures.insert(pid, error);
        self
    }

    pub fn fail_system_information(mut self, request: SystemInformationRequest, error: PlatformError) -> Self {
        self.system_failures.insert(request, error);
        self
    }

    pub fn fail_file_cache_flush(mut self, error: PlatformError) -> Self {
        self.file_cache_flush_failure = Some(error);
        self
    }

    pub fn with_volume(mut self, root: &str) -> Self {
        self.volumes.push(MockVolume { root: root.to_string(), openable: true, ..Default::default() });
        self
    }

    pub fn with_locked_volume(mut self, root: &str) -> Self {
        self.volumes.push(MockVolume { root: root.to_string(), openable: false, ..Default::default() });
        self
    }

    pub fn fail_volume_reset(self, root: &str, error: PlatformError) -> Self {
        self.edit_volume(root, |volume| volume.reset_failure = Some(error))
    }

    pub fn fail_volume_discard(self, root: &str, error: PlatformError) -> Self {
        self.edit_volume(root, |volume| volume.discard_failure = Some(error))
    }

    pub fn fail_volume_flush(self, root: &str, error: PlatformError) -> Self {
        self.edit_volume(root, |volume| volume.flush_failure = Some(error))
    }

    pub fn fail_release(mut self, error: PlatformError) -> Self {
        self.release_failure = Some(error);
        self
    }

    fn edit_volume(mut self, root: &str, edit: impl FnOnce(&mut MockVolume)) -> Self {
        if let Some(volume) = self.volumes.iter_mut().find(|v| v.root == root) {
            edit(volume);
        }
        self
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn privilege_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::EnablePrivilege(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn trimmed_pids(&self) -> Vec<u32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::EmptyWorkingSet(pid) => Some(pid),
                _ => None,
            })
            .collect()
    }

    pub fn system_requests(&self) -> Vec<SystemInformationRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::SetSystemInformation(request) => Some(request),
                _ => None,
            })
            .collect()
    }
}

impl MemoryApi for MockMemoryApi {
    fn os_version(&self) -> OsVersion {
        self.os
    }

    fn is_64bit(&self) -> bool {
        self.is_64bit
    }

    fn memory_counters(&self) -> PlatformResult<MemoryCounters> {
        let mut sequence = self.counters.lock().unwrap();
        if sequence.len() > 1 {
            sequence.pop_front().unwrap()
        } else {
            sequence
                .front()
                .cloned()
                .unwrap_or_else(|| Err(PlatformError::NotSupported("memory counters".into())))
        }
    }

    fn enable_privilege(&self, name: &str) -> bool {
        self.record(MockCall::EnablePrivilege(name.to_string()));
        !self.denied.contains(name)
    }

    fn processes(&self) -> PlatformResult<Vec<ProcessEntry>> {
        self.record(MockCall::Processes);
        match &self.process_list_failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.processes.clone()),
        }
    }

    fn empty_working_set(&self, pid: u32) -> PlatformResult<()> {
        self.record(MockCall::EmptyWorkingSet(pid));
        match self.trim_failures.get(&pid) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn set_system_information(&self, request: SystemInformationRequest) -> PlatformResult<()> {
        self.record(MockCall::SetSystemInformation(request));
        match self.system_failures.get(&request) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn flush_system_file_cache(&self) -> PlatformResult<()> {
        self.record(MockCall::FlushSystemFileCache);
        match &self.file_cache_flush_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn fixed_volumes(&self) -> Vec<String> {
        self.volumes.iter().map(|v| v.root.clone()).collect()
    }

    fn open_volume(&self, root: &str) -> Option<Box<dyn VolumeHandle>> {
        self.record(MockCall::OpenVolume(root.to_string()));
        let volume = self.volumes.iter().find(|v| v.root == root && v.openable)?;
        Some(Box::new(MockVolumeHandle { volume: volume.clone(), calls: Arc::clone(&self.calls) }))
    }

    fn release_own_memory(&self) -> PlatformResult<()> {
        self.record(MockCall::ReleaseOwnMemory);
        match &self.release_failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn apply_priority(&self, priority: Priority) -> PlatformResult<()> {
        self.record(MockCall::ApplyPriority(priority));
        Ok(())
    }
}

struct MockVolumeHandle {
    volume: MockVolume,
    calls: CallLog,
}

impl MockVolumeHandle {
    fn outcome(&self, call: MockCall, failure: &Option<PlatformError>) -> PlatformResult<()> {
        self.calls.lock().unwrap().push(call);
        match failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

impl VolumeHandle for MockVolumeHandle {
    fn root(&self) -> &str {
        &self.volume.root
    }

    fn reset_write_order(&mut self) -> PlatformResult<()> {
        self.outcome(MockCall::ResetWriteOrder(self.volume.root.clone()), &self.volume.reset_failure)
    }

    fn discard_cache(&mut self) -> PlatformResult<()> {
        self.outcome(MockCall::DiscardCache(self.volume.root.clone()), &self.volume.discard_failure)
    }

    fn flush(&mut self) -> PlatformResult<()> {
        self.outcome(MockCall::FlushVolume(self.volume.root.clone()), &self.volume.flush_failure)
    }
}
