//! Control-label lifecycle.
//!
//! Planning is pure; the router applies the plan through the gateway.
//! The once-label is a one-shot trigger, consumed on every pass that
//! observes it. The continuous label only comes off once the retry
//! loop has nothing left to do: zero reruns issued this pass and every
//! selected run settled in success or cancelled.

use crate::config::Config;
use crate::types::{PullRequest, WorkflowRun};

/// Labels to remove from a pull request at the end of a pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelPlan {
    pub remove: Vec<String>,
}

impl LabelPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remove.is_empty()
    }
}

/// Plan label removals after reruns were issued for a pass.
///
/// An empty run selection counts as "all settled": with nothing to
/// observe and no rerun issued there is nothing left for the retry
/// loop to wait on.
#[must_use]
pub fn plan_removals(
    pull_request: &PullRequest,
    selected_runs: &[WorkflowRun],
    reruns_issued: usize,
    config: &Config,
) -> LabelPlan {
    let mut remove = Vec::new();

    if let Some(once) = &config.once_label {
        if pull_request.has_label(once) {
            remove.push(once.clone());
        }
    }

    if let Some(continuous) = &config.continuous_label {
        let all_settled = selected_runs
            .iter()
            .all(WorkflowRun::is_successful_or_cancelled);
        if pull_request.has_label(continuous) && reruns_issued == 0 && all_settled {
            remove.push(continuous.clone());
        }
    }

    LabelPlan { remove }
}

/// Plan removal of both control labels, regardless of run state.
/// Used when a pull request closes and the controls become moot.
#[must_use]
pub fn plan_full_cleanup(pull_request: &PullRequest, config: &Config) -> LabelPlan {
    LabelPlan {
        remove: config
            .control_labels()
            .into_iter()
            .filter(|label| pull_request.has_label(label))
            .collect(),
    }
}
