use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::activity_log::ActivityLog;
use crate::manager::ProcessService;
use crate::process::{PriorityLevel, ProcessRecord};

const NAME_COLUMN_WIDTH: usize = 30;
const NAME_DISPLAY_LENGTH: usize = 27;
const TABLE_WIDTH: usize = 111;
// Gives up on a terminal that keeps failing instead of spinning on it
const MAX_CONSECUTIVE_FAILURES: usize = 5;

enum Flow {
    Continue,
    Quit,
}

/// Interactive terminal loop: show the process table, ask for a PID, boost it.
pub struct ConsoleDisplay<S> {
    processes: Arc<S>,
    log: Arc<dyn ActivityLog>,
    web_url: Option<String>,
    offset: UtcOffset,
}

impl<S: ProcessService> ConsoleDisplay<S> {
    pub fn new(processes: Arc<S>, log: Arc<dyn ActivityLog>, web_url: Option<String>) -> Self {
        ConsoleDisplay { processes, log, web_url, offset: UtcOffset::UTC }
    }

    /// Offset used for the start-time column.
    pub fn with_offset(mut self, offset: UtcOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn run<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) {
        if let Err(e) = self.banner(output) {
            self.log.log_error(&e.to_string());
        }

        let mut failures = 0;
        loop {
            match self.cycle(input, output) {
                Ok(Flow::Continue) => failures = 0,
                Ok(Flow::Quit) => break,
                Err(e) => {
                    let _ = writeln!(output, "Error: {e}");
                    self.log.log_error(&e.to_string());
                    failures += 1;
                    if failures >= MAX_CONSECUTIVE_FAILURES {
                        break;
                    }
                }
            }
        }
    }

    fn banner<W: Write>(&self, output: &mut W) -> io::Result<()> {
        writeln!(output, "Process Manager Application")?;
        writeln!(output, "==========================")?;
        if let Some(url) = &self.web_url {
            writeln!(output, "HTTP server started. Visit {url} in your browser.")?;
        }
        Ok(())
    }

    fn cycle<R: BufRead, W: Write>(&self, input: &mut R, output: &mut W) -> io::Result<Flow> {
        self.display_process_list(output)?;

        write!(output, "\nEnter a PID to boost priority (or 'q' to quit): ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(Flow::Quit);
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(Flow::Quit);
        }

        match line.parse::<i32>() {
            Ok(pid) => {
                if self.processes.set_priority(pid, PriorityLevel::High) {
                    writeln!(output, "Successfully boosted process with PID: {pid} to High priority")?;
                    writeln!(output, "Action logged to {}", self.log.path().display())?;
                } else {
                    writeln!(output, "Failed to boost process with PID: {pid}")?;
                }
            }
            Err(_) => writeln!(output, "Invalid PID format. Please enter a valid number.")?,
        }
        Ok(Flow::Continue)
    }

    fn display_process_list<W: Write>(&self, output: &mut W) -> io::Result<()> {
        let separator = "-".repeat(TABLE_WIDTH);

        writeln!(output, "\nCurrent Running Processes:")?;
        writeln!(output, "{separator}")?;
        writeln!(
            output,
            "| {:<30} | {:<10} | {:<15} | {:<20} | {:<20} |",
            "Process Name", "PID", "Memory (MB)", "Total CPU Time", "Start Time"
        )?;
        writeln!(output, "{separator}")?;

        for process in self.processes.list_all_sorted_by_descending(|p| p.start_time) {
            writeln!(output, "{}", format_row(&process, self.offset))?;
        }

        writeln!(output, "{separator}")
    }
}

fn format_row(process: &ProcessRecord, offset: UtcOffset) -> String {
    format!(
        "| {:<30} | {:<10} | {:<15} | {:<20} | {:<20} |",
        display_name(&process.name),
        process.id,
        format!("{:.2}", process.memory_usage_mb),
        format_cpu_time(process.cpu_time),
        format_start_time(process.start_time, offset),
    )
}

fn display_name(name: &str) -> String {
    if name.chars().count() > NAME_COLUMN_WIDTH {
        let head: String = name.chars().take(NAME_DISPLAY_LENGTH).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

//HH:MM:SS.mmm, hours not wrapped at 24
fn format_cpu_time(cpu_time: Duration) -> String {
    let total = cpu_time.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        cpu_time.subsec_millis()
    )
}

fn format_start_time(start_time: OffsetDateTime, offset: UtcOffset) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    start_time
        .to_offset(offset)
        .format(&format)
        .unwrap_or_default()
}
