//! Session-local tracking of auto-fix requests.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Progress of an auto-fix triggered during this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    /// The fix workflow was started and nothing has arrived yet.
    Pending,
    /// A draft or a pull request URL was observed.
    Done,
}

impl FixStatus {
    /// Stable label for reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
        }
    }
}

/// Fix status per repository identifier. Absent means never triggered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixTracker {
    statuses: HashMap<u64, FixStatus>,
}

impl FixTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a fix as started.
    pub fn begin(&mut self, repo_id: u64) {
        self.statuses.insert(repo_id, FixStatus::Pending);
    }

    /// Mark a fix as delivered.
    pub fn complete(&mut self, repo_id: u64) {
        self.statuses.insert(repo_id, FixStatus::Done);
    }

    /// Forget a fix after an error so it can be retried.
    pub fn fail(&mut self, repo_id: u64) {
        self.statuses.remove(&repo_id);
    }

    /// Current status, `None` when no fix was triggered.
    pub fn get(&self, repo_id: u64) -> Option<FixStatus> {
        self.statuses.get(&repo_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_absent_pending_done() {
        let mut tracker = FixTracker::new();
        assert_eq!(tracker.get(1), None);
        tracker.begin(1);
        assert_eq!(tracker.get(1), Some(FixStatus::Pending));
        tracker.complete(1);
        assert_eq!(tracker.get(1), Some(FixStatus::Done));
        assert_eq!(tracker.get(2), None);
    }

    #[test]
    fn failure_clears_status() {
        let mut tracker = FixTracker::new();
        tracker.begin(3);
        tracker.fail(3);
        assert_eq!(tracker.get(3), None);
    }
}
