use std::sync::atomic::{AtomicU64, Ordering};

/// Status counters shared between the scanner and an (out-of-scope) progress
/// service, per "a relaxed atomic suffices — exact consistency
/// is not required."
#[derive(Debug, Default)]
pub struct ProgressCounters {
    completed: AtomicU64,
    total: AtomicU64,
    fp: AtomicU64,
}

/// A consistent-enough snapshot for a status reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: u64,
    pub total: u64,
    pub false_positives: u64,
}

impl ProgressCounters {
    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn add_completed(&self, n: u64) {
        self.completed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_false_positive(&self) {
        self.fp.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
            false_positives: self.fp.load(Ordering::Relaxed),
        }
    }
}
