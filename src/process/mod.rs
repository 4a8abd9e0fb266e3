
use nix::unistd::{sysconf, SysconfVar};
use procfs::{
    process::Process as ProcfsProcess,
    ProcError,
};
use std::time::Duration;
use time::OffsetDateTime;

mod priority;

pub use priority::PriorityLevel;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const NANOS_PER_SEC: u64 = 1_000_000_000;


// Main Process Data Structure

/// Point-in-time view of one live process.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub id: i32,
    pub name: String,
    pub memory_usage_mb: f64,
    pub cpu_time: Duration,
    pub start_time: OffsetDateTime,
}

/// Kernel clock facts needed to turn `/proc/<pid>/stat` tick counts into wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemClock {
    pub ticks_per_second: u64,
    pub boot_time_secs: u64,
}

impl SystemClock {
    pub fn read() -> Result<Self, String> {
        let ticks_per_second = match sysconf(SysconfVar::CLK_TCK) {
            Ok(Some(hz)) if hz > 0 => hz as u64,
            Ok(_) => return Err("CLK_TCK is not available".to_string()),
            Err(e) => return Err(format!("Failed to read CLK_TCK: {}", e)),
        };
        let boot_time_secs = procfs::boot_time_secs()
            .map_err(|e| format!("Failed to read boot time: {}", e))?;

        Ok(SystemClock { ticks_per_second, boot_time_secs })
    }

    pub fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let secs = ticks / self.ticks_per_second;
        let rem = ticks % self.ticks_per_second;
        Duration::new(secs, (rem * NANOS_PER_SEC / self.ticks_per_second) as u32)
    }

    /// `start_ticks` is the `starttime` field: ticks after boot.
    pub fn start_time(&self, start_ticks: u64) -> Option<OffsetDateTime> {
        let since_boot = self.ticks_to_duration(start_ticks);
        let nanos = i128::from(self.boot_time_secs) * i128::from(NANOS_PER_SEC)
            + since_boot.as_nanos() as i128;
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}


// Implementation

impl ProcessRecord {
    /// Reads one process out of /proc. Fails if the process vanished or is not readable.
    pub fn read(procfs_proc: &ProcfsProcess, clock: &SystemClock) -> Result<Self, ProcError> {
        let stat = procfs_proc.stat()?;
        let page_size: u64 = procfs::page_size();
        let rss_bytes = stat.rss as u64 * page_size;
        let start_time = clock.start_time(stat.starttime).ok_or_else(|| {
            ProcError::Other(format!("start time out of range for PID {}", stat.pid))
        })?;

        Ok(ProcessRecord {
            id: stat.pid,
            name: stat.comm,
            memory_usage_mb: bytes_to_mb(rss_bytes),
            cpu_time: clock.ticks_to_duration(stat.utime + stat.stime),
            start_time,
        })
    }
}
