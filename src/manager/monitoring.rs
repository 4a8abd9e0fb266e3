use std::path::Path;

use tracing::trace;

use crate::activity_log::ActivityLog;
use crate::process::{ProcessRecord, SystemClock};

/// Best-effort snapshot. A failure of the enumeration as a whole is logged and yields no records.
pub fn snapshot(log: &dyn ActivityLog) -> Vec<ProcessRecord> {
    snapshot_at(log, Path::new("/proc"))
}

/// [`snapshot`] over a procfs mounted at `root`.
pub fn snapshot_at(log: &dyn ActivityLog, root: &Path) -> Vec<ProcessRecord> {
    match read_processes(root) {
        Ok(records) => records,
        Err(e) => {
            log.log_error(&format!("Error getting process list: {}", e));
            Vec::new()
        }
    }
}

// Reads the /proc filesystem; individual processes that vanish or deny access are dropped.
fn read_processes(root: &Path) -> Result<Vec<ProcessRecord>, String> {
    let clock = SystemClock::read()?;

    let procfs_processes = match procfs::process::all_processes_with_root(root) { //Reading intial process list
        Ok(p) => p,
        Err(e) => return Err(e.to_string()),
    };

    let records = procfs_processes
        .filter_map(|p| {
            let procfs_proc = p.ok()?; //Skip listing errors
            match ProcessRecord::read(&procfs_proc, &clock) {
                Ok(record) => Some(record),
                Err(e) => {
                    trace!(pid = procfs_proc.pid, error = ?e, "skipping unreadable process");
                    None
                }
            }
        })
        .collect();

    Ok(records)
}
