//! Snapshot the local process table, boost process priorities, and record what was done.
//!
//! The same [`manager::ProcessService`] backs both the terminal loop in [`console`] and the
//! HTTP surface in [`web`].

pub mod activity_log;
pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod manager;
pub mod process;
pub mod web;

#[cfg(test)]
mod testing;

pub use activity_log::{ActivityLog, FileActivityLog};
pub use config::Config;
pub use error::{Error, Result};
pub use manager::{Manager, ProcessService, SortKey};
pub use process::{PriorityLevel, ProcessRecord};
