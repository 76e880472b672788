//! Aggregated result of a reconciliation pass.

use serde::Serialize;

use crate::domain::Platform;

/// Result of one reconciliation pass.
///
/// Every attempted attachment lands in exactly one of `online`, `offline` or
/// `failed`, so `checked == online + offline + failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub checked: usize,
    pub online: usize,
    pub offline: usize,
    /// Store writes issued.
    pub updated: usize,
    pub failed: usize,
    pub failures: Vec<CheckFailure>,
}

/// Operator-facing detail for one failed attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub streamer_id: String,
    pub alias: String,
    pub platform: Platform,
    pub channel_id: Option<String>,
    pub error: String,
}

impl CheckSummary {
    pub(crate) fn record_observation(&mut self, live: bool, written: bool) {
        self.checked += 1;
        if live {
            self.online += 1;
        } else {
            self.offline += 1;
        }
        if written {
            self.updated += 1;
        }
    }

    pub(crate) fn record_failure(&mut self, failure: CheckFailure) {
        self.checked += 1;
        self.failed += 1;
        self.failures.push(failure);
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}
