use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::{error, info, warn};

use crate::process::ProcessRecord;

/// Append-only, human-readable record of what the booster did.
pub trait ActivityLog: Send + Sync {
    fn path(&self) -> &Path;
    fn log_info(&self, message: &str);
    fn log_error(&self, message: &str);
    /// Writes one timestamped block listing name, id and memory of each record.
    fn log_processes(&self, processes: &[ProcessRecord]);
}

#[derive(Debug)]
pub struct FileActivityLog {
    path: PathBuf,
    offset: UtcOffset,
    write_lock: Mutex<()>,
}

impl FileActivityLog {
    /// Timestamps are written in UTC unless [`with_offset`](Self::with_offset) says otherwise.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileActivityLog {
            path: path.into(),
            offset: UtcOffset::UTC,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    fn timestamp(&self) -> String {
        timestamp_at(OffsetDateTime::now_utc().to_offset(self.offset))
    }

    //Every entry is one locked append so lines from different threads never interleave
    fn append(&self, entry: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(format!("{entry}\n").as_bytes()));

        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "Error writing to log file");
        }
    }
}

impl ActivityLog for FileActivityLog {
    fn path(&self) -> &Path {
        &self.path
    }

    fn log_info(&self, message: &str) {
        info!("{message}");
        self.append(&format!("{} - INFO: {message}", self.timestamp()));
    }

    fn log_error(&self, message: &str) {
        error!("{message}");
        self.append(&format!("{} - ERROR: {message}", self.timestamp()));
    }

    fn log_processes(&self, processes: &[ProcessRecord]) {
        info!(count = processes.len(), "logging top processes");
        self.append(&process_block(&self.timestamp(), processes));
    }
}

fn timestamp_at(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.format(&format).unwrap_or_default()
}

fn process_block(timestamp: &str, processes: &[ProcessRecord]) -> String {
    let mut block = format!(
        "{timestamp} - Top {} processes by memory usage:\n",
        processes.len()
    );
    for process in processes {
        let _ = writeln!(
            block,
            "  - {} (PID: {}): {:.2} MB",
            process.name, process.id, process.memory_usage_mb
        );
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn record(id: i32, name: &str, mb: f64) -> ProcessRecord {
        ProcessRecord {
            id,
            name: name.to_string(),
            memory_usage_mb: mb,
            cpu_time: Duration::ZERO,
            start_time: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn info_and_error_lines_are_tagged() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileActivityLog::new(dir.path().join("boost_log.txt"));

        log.log_info("Changed something");
        log.log_error("Something failed");

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO: Changed something"));
        assert!(lines[1].ends_with(" - ERROR: Something failed"));
        // "YYYY-MM-DD HH:MM:SS" prefix
        assert_eq!(lines[0].find(" - ").unwrap(), 19);
    }

    #[test]
    fn timestamps_follow_the_configured_offset() {
        let offset = UtcOffset::from_hms(5, 30, 0).unwrap();
        assert_eq!(
            timestamp_at(OffsetDateTime::UNIX_EPOCH.to_offset(offset)),
            "1970-01-01 05:30:00"
        );

        let log = FileActivityLog::new("unused.txt").with_offset(offset);
        let utc = FileActivityLog::new("unused.txt");
        assert_eq!(log.offset, offset);
        assert_eq!(utc.offset, UtcOffset::UTC);
    }

    #[test]
    fn process_block_lists_each_record() {
        let block = process_block(
            "2024-01-02 03:04:05",
            &[record(42, "firefox", 512.256), record(7, "sshd", 1.0)],
        );
        assert_eq!(
            block,
            "2024-01-02 03:04:05 - Top 2 processes by memory usage:\n  - firefox (PID: 42): 512.26 MB\n  - sshd (PID: 7): 1.00 MB\n"
        );
    }

    #[test]
    fn unwritable_path_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let log = FileActivityLog::new(dir.path().join("missing").join("log.txt"));
        log.log_error("nobody hears this");
        assert!(!log.path().exists());
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FileActivityLog::new(dir.path().join("log.txt")));
        let (n, m) = (200, 150);

        let a = {
            let log = Arc::clone(&log);
            thread::spawn(move || (0..n).for_each(|i| log.log_info(&format!("writer-a line {i}"))))
        };
        let b = {
            let log = Arc::clone(&log);
            thread::spawn(move || (0..m).for_each(|i| log.log_error(&format!("writer-b line {i}"))))
        };
        a.join().unwrap();
        b.join().unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), n + m);
        let from_a = lines.iter().filter(|l| l.contains(" - INFO: writer-a line ")).count();
        let from_b = lines.iter().filter(|l| l.contains(" - ERROR: writer-b line ")).count();
        assert_eq!((from_a, from_b), (n, m));
    }
}
