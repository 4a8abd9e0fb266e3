use nix::errno::Errno;
use procfs::{ProcError, process::Process as ProcfsProcess};

use libc::{setpriority, PRIO_PROCESS};
use crate::activity_log::ActivityLog;
use crate::process::PriorityLevel;


//Set Priority: every outcome is logged, only success returns true
pub fn set_priority(log: &dyn ActivityLog, pid: i32, level: PriorityLevel) -> bool {
    let name = match lookup_name(pid) {
        Ok(Some(name)) => name,
        Ok(None) => {
            log.log_error(&format!("No process with PID {} was found", pid));
            return false;
        }
        Err(e) => {
            log.log_error(&format!("Error changing process priority: {}", e));
            return false;
        }
    };

    match renice(pid, level.nice_value()) {
        Ok(()) => {
            log.log_info(&format!(
                "Changed process PID: {} ({}) priority to {}",
                pid, name, level
            ));
            true
        }
        Err(e) => {
            log.log_error(&format!("Error changing process priority: {}", e));
            false
        }
    }
}

//Ok(None) when no live process has this pid
fn lookup_name(pid: i32) -> Result<Option<String>, ProcError> {
    // pid 0 would make setpriority target the caller
    if pid <= 0 {
        return Ok(None);
    }

    match ProcfsProcess::new(pid).and_then(|p| p.stat()) {
        Ok(stat) => Ok(Some(stat.comm)),
        Err(ProcError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn renice(pid: i32, nice_value: i32) -> nix::Result<()> {
    let res = unsafe {
        setpriority(PRIO_PROCESS, pid as u32, nice_value)
    };

    Errno::result(res).map(|_| ())
}
