use std::cmp::Ordering;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::activity_log::ActivityLog;
use crate::process::{PriorityLevel, ProcessRecord};

pub mod monitoring;
pub mod operations;

/// What the HTTP router and the console need from the OS: read a snapshot, change a priority.
pub trait ProcessService: Send + Sync {
    /// Every process that could be read right now. Never fails; unreadable processes are left out.
    fn list_all(&self) -> Vec<ProcessRecord>;

    /// Returns false (after logging why) when the pid is unknown or the OS refuses.
    fn set_priority(&self, pid: i32, level: PriorityLevel) -> bool;

    fn list_all_sorted_by_descending<K, F>(&self, key: F) -> Vec<ProcessRecord>
    where
        Self: Sized,
        K: SortKey,
        F: Fn(&ProcessRecord) -> K,
    {
        sort_descending_by(self.list_all(), key)
    }
}

/// A record field that can be ordered totally, floats included.
pub trait SortKey {
    fn total_order(&self, other: &Self) -> Ordering;
}

impl SortKey for f64 {
    // NaN sorts above every number instead of comparing equal to all of them
    fn total_order(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl SortKey for i32 {
    fn total_order(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl SortKey for OffsetDateTime {
    fn total_order(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// Stable descending sort: records with equal keys keep their enumeration order.
pub fn sort_descending_by<K, F>(mut records: Vec<ProcessRecord>, key: F) -> Vec<ProcessRecord>
where
    K: SortKey,
    F: Fn(&ProcessRecord) -> K,
{
    records.sort_by(|a, b| key(b).total_order(&key(a)));
    records
}

//Manager struct declaration: the /proc + setpriority(2) backed service
pub struct Manager {
    log: Arc<dyn ActivityLog>,
}

impl Manager {
    pub fn new(log: Arc<dyn ActivityLog>) -> Self {
        Manager { log }
    }
}

impl ProcessService for Manager {
    fn list_all(&self) -> Vec<ProcessRecord> {
        monitoring::snapshot(self.log.as_ref())
    }

    fn set_priority(&self, pid: i32, level: PriorityLevel) -> bool {
        operations::set_priority(self.log.as_ref(), pid, level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeProcesses, RecordingLog, record};
    use proptest::prelude::*;

    #[test]
    fn sorts_by_memory_descending() {
        let fake = FakeProcesses::new(vec![
            record(1, "a", 10.0, 0),
            record(2, "b", 300.0, 0),
            record(3, "c", 42.5, 0),
        ]);
        let ids: Vec<i32> = fake
            .list_all_sorted_by_descending(|p| p.memory_usage_mb)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn ties_keep_enumeration_order() {
        let records = vec![
            record(5, "x", 1.0, 100),
            record(9, "y", 1.0, 300),
            record(2, "z", 1.0, 100),
            record(7, "w", 1.0, 300),
        ];
        let ids: Vec<i32> = sort_descending_by(records, |p| p.start_time)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![9, 7, 5, 2]);
    }

    #[test]
    fn nan_memory_does_not_break_the_order() {
        let records = vec![
            record(1, "a", 10.0, 0),
            record(2, "b", f64::NAN, 0),
            record(3, "c", 300.0, 0),
            record(4, "d", 10.0, 0),
        ];
        let ids: Vec<i32> = sort_descending_by(records, |p| p.memory_usage_mb)
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);
    }

    #[test]
    fn sorts_by_pid() {
        let records = vec![record(3, "a", 0.0, 0), record(11, "b", 0.0, 0), record(7, "c", 0.0, 0)];
        let ids: Vec<i32> = sort_descending_by(records, |p| p.id).iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![11, 7, 3]);
    }

    #[test]
    fn manager_snapshot_contains_this_process() {
        let log = Arc::new(RecordingLog::default());
        let manager = Manager::new(log.clone());
        let me = std::process::id() as i32;
        assert!(manager.list_all().iter().any(|p| p.id == me));
        assert!(log.errors().is_empty());
    }

    proptest! {
        #[test]
        fn sorted_output_is_non_increasing_and_stable(keys in proptest::collection::vec(0u8..6, 0..40)) {
            let records: Vec<ProcessRecord> = keys
                .iter()
                .enumerate()
                .map(|(i, k)| record(i as i32, "p", f64::from(*k), 0))
                .collect();

            let sorted = sort_descending_by(records, |p| p.memory_usage_mb);

            prop_assert_eq!(sorted.len(), keys.len());
            for pair in sorted.windows(2) {
                prop_assert!(pair[0].memory_usage_mb >= pair[1].memory_usage_mb);
                if pair[0].memory_usage_mb == pair[1].memory_usage_mb {
                    prop_assert!(pair[0].id < pair[1].id);
                }
            }
        }
    }
}
