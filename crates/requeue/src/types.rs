//! Domain snapshots and decision enums.
//!
//! Everything here is a read-only view of remote state, fetched fresh
//! per invocation. Nothing is persisted between invocations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trigger events whose runs we consider for a pull request, in
/// selection order.
pub const PULL_REQUEST_EVENTS: [&str; 2] = ["pull_request", "pull_request_target"];

/// Snapshot of a pull request at the start of a processing pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// Pull request number
    pub number: u64,
    /// Head branch name
    pub head_ref: String,
    /// Head commit SHA
    pub head_sha: String,
    /// Names of the labels currently applied
    pub labels: Vec<String>,
}

impl PullRequest {
    /// Check whether a label is currently applied.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Workflow run status as reported by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is waiting for a runner.
    Queued,
    /// Run is executing.
    InProgress,
    /// Run reached a terminal state; see the conclusion.
    Completed,
    /// Status outside the recognized set.
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Workflow run conclusion, only meaningful once completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunConclusion {
    Success,
    Failure,
    Cancelled,
    /// Conclusion outside the recognized set (skipped, timed out, ...).
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for RunConclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Snapshot of a single workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique workflow run ID
    pub id: u64,
    /// Event that triggered the run ("pull_request", "push", ...)
    pub event: String,
    /// Current status
    pub status: RunStatus,
    /// Conclusion, present once the run completed
    pub conclusion: Option<RunConclusion>,
    /// Last update time; absent on some freshly-created runs
    pub updated_at: Option<DateTime<Utc>>,
    /// Pull request numbers the API associated with this run (may be
    /// empty, notably for fork PRs)
    pub pull_requests: Vec<u64>,
    /// Branch of the commit that triggered the run
    pub head_branch: String,
    /// SHA of the commit that triggered the run
    pub head_sha: String,
    /// Owner login of the head repository (the fork for fork PRs)
    pub head_owner: Option<String>,
}

impl WorkflowRun {
    /// True when the run completed with a success or cancelled
    /// conclusion, i.e. the states that stop the continuous retry loop.
    #[must_use]
    pub fn is_successful_or_cancelled(&self) -> bool {
        self.status == RunStatus::Completed
            && matches!(
                self.conclusion,
                Some(RunConclusion::Success | RunConclusion::Cancelled)
            )
    }
}

/// Under which circumstances a selected run should be re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerunCondition {
    /// Re-run unless already queued or in progress.
    Always,
    /// Re-run only when completed and failed.
    OnFailure,
    /// Never re-run, only reconcile labels.
    Never,
}

/// Outcome of a policy decision for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    /// Trigger a re-run.
    Rerun,
    /// Run is already queued or executing; nothing to do.
    AlreadyActive,
    /// Run finished in a state that needs no retry.
    TerminalOk,
    /// Condition says leave the run alone.
    Skipped,
    /// Status or conclusion outside the recognized set; logged, no
    /// action taken.
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_wire_values() {
        let s: RunStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(s, RunStatus::InProgress);

        // Anything unrecognized folds into Unknown instead of failing.
        let s: RunStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(s, RunStatus::Unknown);
    }

    #[test]
    fn test_conclusion_parses_wire_values() {
        let c: RunConclusion = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(c, RunConclusion::Cancelled);

        let c: RunConclusion = serde_json::from_str("\"timed_out\"").unwrap();
        assert_eq!(c, RunConclusion::Unknown);
    }

    #[test]
    fn test_successful_or_cancelled() {
        let mut run = WorkflowRun {
            id: 1,
            event: "pull_request".to_string(),
            status: RunStatus::Completed,
            conclusion: Some(RunConclusion::Success),
            updated_at: None,
            pull_requests: vec![],
            head_branch: "main".to_string(),
            head_sha: "abc".to_string(),
            head_owner: None,
        };
        assert!(run.is_successful_or_cancelled());

        run.conclusion = Some(RunConclusion::Cancelled);
        assert!(run.is_successful_or_cancelled());

        run.conclusion = Some(RunConclusion::Failure);
        assert!(!run.is_successful_or_cancelled());

        run.status = RunStatus::InProgress;
        run.conclusion = Some(RunConclusion::Success);
        assert!(!run.is_successful_or_cancelled());
    }
}
