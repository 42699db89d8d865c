//! Execution counters.
//!
//! Counters are shared by foreground computes and background persists;
//! `ExecStats` is a plain snapshot of them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecStats {
    /// Task functions actually run.
    pub executed: u64,
    /// Submissions answered by an already-known task with the same key.
    pub deduplicated: u64,
    /// Requests served from persisted results.
    pub reused: u64,
    /// Tasks that failed, including those skipped because an input failed.
    pub failed: u64,
}

impl ExecStats {
    /// Counts accumulated since `earlier`.
    pub fn since(&self, earlier: &ExecStats) -> ExecStats {
        ExecStats {
            executed: self.executed.saturating_sub(earlier.executed),
            deduplicated: self.deduplicated.saturating_sub(earlier.deduplicated),
            reused: self.reused.saturating_sub(earlier.reused),
            failed: self.failed.saturating_sub(earlier.failed),
        }
    }
}

impl fmt::Display for ExecStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "executed={} deduplicated={} reused={} failed={}",
            self.executed, self.deduplicated, self.reused, self.failed
        )
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    executed: AtomicU64,
    deduplicated: AtomicU64,
    reused: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    pub(crate) fn executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reused(&self) {
        self.reused.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ExecStats {
        ExecStats {
            executed: self.executed.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_difference() {
        let c = Counters::default();
        c.executed();
        let before = c.snapshot();
        c.executed();
        c.reused();
        let delta = c.snapshot().since(&before);
        assert_eq!(
            delta,
            ExecStats {
                executed: 1,
                deduplicated: 0,
                reused: 1,
                failed: 0
            }
        );
        assert_eq!(delta.to_string(), "executed=1 deduplicated=0 reused=1 failed=0");
    }
}
