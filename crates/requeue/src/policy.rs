//! Rerun decision table.
//!
//! Pure state machine over run status, conclusion and the requested
//! [`RerunCondition`]. Statuses and conclusions outside the recognized
//! set map to [`RunAction::Unsupported`] so the caller can log them and
//! move on.

use crate::types::{RerunCondition, RunAction, RunConclusion, RunStatus, WorkflowRun};

/// Decide what to do with one selected run.
#[must_use]
pub fn decide(run: &WorkflowRun, condition: RerunCondition) -> RunAction {
    match run.status {
        RunStatus::Unknown => RunAction::Unsupported,
        // An active run will report back through the workflow_run
        // callback; re-running it now would be rejected anyway.
        RunStatus::Queued | RunStatus::InProgress => match condition {
            RerunCondition::Never => RunAction::Skipped,
            RerunCondition::Always | RerunCondition::OnFailure => RunAction::AlreadyActive,
        },
        RunStatus::Completed => match condition {
            RerunCondition::Never => RunAction::Skipped,
            RerunCondition::Always => RunAction::Rerun,
            RerunCondition::OnFailure => match run.conclusion {
                Some(RunConclusion::Failure) => RunAction::Rerun,
                Some(RunConclusion::Success | RunConclusion::Cancelled) => RunAction::TerminalOk,
                Some(RunConclusion::Unknown) | None => RunAction::Unsupported,
            },
        },
    }
}
