//! Structured run reports.
//!
//! A report is the whole user-visible outcome of a conformance run: one
//! entry per authored action, the first failure (if any), and the
//! teardown record. Shutdown failures are reported separately and never
//! change the primary verdict.

use ivcheck_error::IvError;
use serde::{Deserialize, Serialize};

/// JSON schema version tag for [`TestRunReport`].
pub const REPORT_SCHEMA_V1: &str = "ivcheck.report.v1";

/// Outcome of one authored action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Dispatched and verified.
    Pass,
    /// The action where the run's first failure occurred.
    Fail,
    /// Never dispatched — an earlier action already failed.
    Skipped,
}

/// Per-action report entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// Position in the authored script.
    pub index: usize,
    /// Operation tag.
    pub operation: String,
    /// Target rank.
    pub rank: u32,
    pub status: ActionStatus,
    /// Wall-clock time spent dispatching and verifying; 0 when skipped.
    pub duration_ms: u64,
}

/// The run's first failure. Later actions are skipped, so there is never
/// a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Index of the offending action, when the failure is anchored to one.
    pub action_index: Option<usize>,
    /// Machine-readable kind: `malformed_action`, `invocation_failure`,
    /// or `protocol_mismatch`; environment problems surface as `config`
    /// or `io`.
    pub kind: String,
    /// Human-readable description of the violated expectation.
    pub message: String,
}

impl FailureInfo {
    #[must_use]
    pub fn from_error(err: &IvError) -> Self {
        Self {
            action_index: err.action_index(),
            kind: err.kind_label().to_owned(),
            message: err.to_string(),
        }
    }
}

/// One failed shutdown attempt. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownFailureRecord {
    pub rank: u32,
    pub detail: String,
}

/// Teardown record: which ranks were asked to shut down, in order, and
/// which attempts failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownReport {
    /// Ranks in the order shutdown was requested. The root (rank 0) is
    /// always last.
    pub attempted: Vec<u32>,
    pub failures: Vec<ShutdownFailureRecord>,
}

impl ShutdownReport {
    #[must_use]
    pub fn clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Top-level report for one conformance run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRunReport {
    pub schema_version: String,
    /// Client binary that drove the run.
    pub client_bin: String,
    /// Ranks in the server group.
    pub rank_count: u32,
    /// One entry per authored action, in script order.
    pub actions: Vec<ActionOutcome>,
    /// First violated expectation, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<FailureInfo>,
    pub shutdown: ShutdownReport,
    /// Primary verdict: true iff no action failed. Shutdown failures do
    /// not affect this.
    pub success: bool,
}

impl TestRunReport {
    #[must_use]
    pub fn new(client_bin: String, rank_count: u32) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_V1.to_owned(),
            client_bin,
            rank_count,
            actions: Vec::new(),
            first_failure: None,
            shutdown: ShutdownReport::default(),
            success: false,
        }
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let passed = self
            .actions
            .iter()
            .filter(|a| a.status == ActionStatus::Pass)
            .count();
        let verdict = if self.success { "PASS" } else { "FAIL" };
        let mut line = format!("{verdict}: {passed}/{} actions passed", self.actions.len());
        if let Some(failure) = &self.first_failure {
            line.push_str("; first failure: ");
            line.push_str(&failure.message);
        }
        if !self.shutdown.clean() {
            line.push_str(&format!(
                " ({} shutdown failure(s))",
                self.shutdown.failures.len()
            ));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use ivcheck_error::IvError;

    use super::{ActionOutcome, ActionStatus, FailureInfo, ShutdownFailureRecord, TestRunReport};

    #[test]
    fn failure_info_carries_kind_and_index() {
        let err = IvError::ProtocolMismatch {
            index: 2,
            what: "value",
            expected: "7475726e6970".to_owned(),
            actual: "636172726f74".to_owned(),
        };
        let info = FailureInfo::from_error(&err);
        assert_eq!(info.action_index, Some(2));
        assert_eq!(info.kind, "protocol_mismatch");
    }

    #[test]
    fn shutdown_failures_do_not_change_the_verdict() {
        let mut report = TestRunReport::new("iv_client".to_owned(), 5);
        report.actions.push(ActionOutcome {
            index: 0,
            operation: "update".to_owned(),
            rank: 0,
            status: ActionStatus::Pass,
            duration_ms: 3,
        });
        report.success = true;
        report.shutdown.failures.push(ShutdownFailureRecord {
            rank: 4,
            detail: "exit 1".to_owned(),
        });

        assert!(report.success);
        assert!(!report.shutdown.clean());
        let summary = report.summary();
        assert!(summary.starts_with("PASS"));
        assert!(summary.contains("shutdown failure"));
    }
}
