//! In-memory stand-ins for the OS and the log file, used by unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use time::OffsetDateTime;

use crate::activity_log::ActivityLog;
use crate::manager::ProcessService;
use crate::process::{PriorityLevel, ProcessRecord};

pub fn record(id: i32, name: &str, memory_usage_mb: f64, started_at: i64) -> ProcessRecord {
    ProcessRecord {
        id,
        name: name.to_string(),
        memory_usage_mb,
        cpu_time: Duration::from_millis(1_500),
        start_time: OffsetDateTime::from_unix_timestamp(started_at).unwrap(),
    }
}

#[derive(Debug, Default)]
pub struct RecordingLog {
    pub path: PathBuf,
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
    batches: Mutex<Vec<Vec<ProcessRecord>>>,
}

impl RecordingLog {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        RecordingLog { path: path.into(), ..Default::default() }
    }

    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().unwrap().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<Vec<ProcessRecord>> {
        self.batches.lock().unwrap().clone()
    }
}

impl ActivityLog for RecordingLog {
    fn path(&self) -> &Path {
        &self.path
    }

    fn log_info(&self, message: &str) {
        self.infos.lock().unwrap().push(message.to_string());
    }

    fn log_error(&self, message: &str) {
        self.errors.lock().unwrap().push(message.to_string());
    }

    fn log_processes(&self, processes: &[ProcessRecord]) {
        self.batches.lock().unwrap().push(processes.to_vec());
    }
}

/// Fixed process table; `set_priority` succeeds only for listed pids.
#[derive(Debug, Default)]
pub struct FakeProcesses {
    pub records: Vec<ProcessRecord>,
    pub boosts: Mutex<Vec<(i32, PriorityLevel)>>,
    pub deny: bool,
}

impl FakeProcesses {
    pub fn new(records: Vec<ProcessRecord>) -> Self {
        FakeProcesses { records, ..Default::default() }
    }

    pub fn boosts(&self) -> Vec<(i32, PriorityLevel)> {
        self.boosts.lock().unwrap().clone()
    }
}

impl ProcessService for FakeProcesses {
    fn list_all(&self) -> Vec<ProcessRecord> {
        self.records.clone()
    }

    fn set_priority(&self, pid: i32, level: PriorityLevel) -> bool {
        self.boosts.lock().unwrap().push((pid, level));
        !self.deny && self.records.iter().any(|p| p.id == pid)
    }
}
