//! Run selection for a pull request.
//!
//! Out of everything the workflow ran on a branch, only the runs for
//! the PR's current head commit matter; older commits on the same
//! branch leave stale runs behind that must never be re-run.

use tracing::{info, warn};

use crate::types::{PullRequest, WorkflowRun, PULL_REQUEST_EVENTS};

/// Select the most-recently-updated run per recognized trigger event,
/// restricted to runs of the PR's current head branch and commit.
///
/// Returns at most one run per event in [`PULL_REQUEST_EVENTS`] order.
/// An empty result means no run matched the head commit; that is a
/// warning for the operator, not an error.
#[must_use]
pub fn select_latest_runs(all_runs: &[WorkflowRun], pull_request: &PullRequest) -> Vec<WorkflowRun> {
    let matching: Vec<&WorkflowRun> = all_runs
        .iter()
        .filter(|run| {
            run.head_branch == pull_request.head_ref && run.head_sha == pull_request.head_sha
        })
        .collect();

    if matching.is_empty() {
        warn!(
            pr_number = pull_request.number,
            "No matching workflow runs found for pull request"
        );
        return Vec::new();
    }

    let selected: Vec<WorkflowRun> = PULL_REQUEST_EVENTS
        .iter()
        .filter_map(|event| latest_run_for_event(&matching, event))
        .cloned()
        .collect();

    info!(
        pr_number = pull_request.number,
        run_ids = ?selected.iter().map(|run| run.id).collect::<Vec<_>>(),
        "Selected latest workflow runs for pull request"
    );

    selected
}

/// The run with the greatest `updated_at` among runs of one event.
/// Runs without a timestamp compare older than any timestamped run.
fn latest_run_for_event<'a>(runs: &[&'a WorkflowRun], event: &str) -> Option<&'a WorkflowRun> {
    runs.iter()
        .filter(|run| run.event == event)
        .max_by_key(|run| run.updated_at)
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RunConclusion, RunStatus};
    use chrono::{TimeZone, Utc};

    fn pull_request() -> PullRequest {
        PullRequest {
            number: 42,
            head_ref: "feature".to_string(),
            head_sha: "abc123".to_string(),
            labels: vec![],
        }
    }

    fn run(id: u64, event: &str, branch: &str, sha: &str, updated_hour: Option<u32>) -> WorkflowRun {
        WorkflowRun {
            id,
            event: event.to_string(),
            status: RunStatus::Completed,
            conclusion: Some(RunConclusion::Failure),
            updated_at: updated_hour.map(|h| Utc.with_ymd_and_hms(2026, 8, 1, h, 0, 0).unwrap()),
            pull_requests: vec![],
            head_branch: branch.to_string(),
            head_sha: sha.to_string(),
            head_owner: None,
        }
    }

    #[test]
    fn test_picks_latest_per_event() {
        let runs = vec![
            run(1, "pull_request", "feature", "abc123", Some(10)),
            run(2, "pull_request", "feature", "abc123", Some(12)),
            run(3, "pull_request_target", "feature", "abc123", Some(11)),
        ];

        let selected = select_latest_runs(&runs, &pull_request());
        let ids: Vec<u64> = selected.iter().map(|run| run.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_event_enumeration_order() {
        // pull_request comes first even when its run is older.
        let runs = vec![
            run(5, "pull_request_target", "feature", "abc123", Some(15)),
            run(4, "pull_request", "feature", "abc123", Some(9)),
        ];

        let selected = select_latest_runs(&runs, &pull_request());
        let ids: Vec<u64> = selected.iter().map(|run| run.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn test_excludes_stale_commits_and_foreign_branches() {
        let runs = vec![
            // Same branch, superseded commit: newest of all, still out.
            run(1, "pull_request", "feature", "old456", Some(20)),
            run(2, "pull_request", "other", "abc123", Some(19)),
            run(3, "pull_request", "feature", "abc123", Some(8)),
        ];

        let selected = select_latest_runs(&runs, &pull_request());
        let ids: Vec<u64> = selected.iter().map(|run| run.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_missing_timestamp_compares_older() {
        let runs = vec![
            run(1, "pull_request", "feature", "abc123", None),
            run(2, "pull_request", "feature", "abc123", Some(1)),
        ];

        let selected = select_latest_runs(&runs, &pull_request());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, 2);
    }

    #[test]
    fn test_unrecognized_events_are_ignored() {
        let runs = vec![run(1, "push", "feature", "abc123", Some(10))];
        assert!(select_latest_runs(&runs, &pull_request()).is_empty());
    }

    #[test]
    fn test_no_matching_runs_is_empty_not_error() {
        assert!(select_latest_runs(&[], &pull_request()).is_empty());
    }
}
