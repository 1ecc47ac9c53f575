//! Event routing and the per-PR processing pass.
//!
//! One invocation handles exactly one event. A pass over a single pull
//! request is strictly sequential: fetch the PR, select runs, decide
//! and issue reruns, then reconcile labels. Across pull requests the
//! scan and callback flows fan out concurrently; one PR failing never
//! aborts the others. Every remote mutation is idempotent, so an
//! at-least-once redelivery of the same event is harmless.

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{info, warn};

use crate::config::Config;
use crate::event::EventContext;
use crate::github::RepoGateway;
use crate::labels::{plan_full_cleanup, plan_removals, LabelPlan};
use crate::policy::decide;
use crate::selector::select_latest_runs;
use crate::types::{RerunCondition, RunAction, WorkflowRun, PULL_REQUEST_EVENTS};

/// Routes one incoming event to the matching flow.
pub struct Router<'a> {
    gateway: &'a dyn RepoGateway,
    config: &'a Config,
}

impl<'a> Router<'a> {
    #[must_use]
    pub fn new(gateway: &'a dyn RepoGateway, config: &'a Config) -> Self {
        Self { gateway, config }
    }

    /// Dispatch the event to its flow. Unrecognized events are a
    /// warning and a successful no-op.
    ///
    /// # Errors
    /// Returns an error on malformed payloads or when a PR snapshot
    /// cannot be fetched for the direct label flow; per-run and
    /// per-label remote failures are logged and recovered.
    pub async fn dispatch(&self, context: &EventContext) -> Result<()> {
        match context.event_name.as_str() {
            "pull_request" | "pull_request_target" => {
                self.handle_pull_request_event(context).await
            }
            "push" | "schedule" | "workflow_dispatch" => self.handle_scan_event().await,
            "workflow_run" => self.handle_workflow_run_event(context).await,
            other => {
                warn!("This tool does not support the '{other}' event");
                Ok(())
            }
        }
    }

    /// Direct label flow: a label changed on a single pull request.
    async fn handle_pull_request_event(&self, context: &EventContext) -> Result<()> {
        let payload = context.pull_request_payload()?;

        match payload.action.as_str() {
            "labeled" | "unlabeled" => {
                let Some(label) = payload.label.as_ref().map(|l| l.name.as_str()) else {
                    warn!(
                        action = %payload.action,
                        "Label event without a label in the payload"
                    );
                    return Ok(());
                };

                let once_added = payload.action == "labeled"
                    && self.config.once_label.as_deref() == Some(label);
                let trigger_changed = self.config.trigger_labels.iter().any(|t| t == label);

                if once_added || trigger_changed {
                    self.process_pull_request(payload.number, RerunCondition::Always)
                        .await
                } else {
                    Ok(())
                }
            }
            "closed" => {
                // The controls are moot on a closed PR; take both off.
                let pull_request = self
                    .gateway
                    .get_pull_request(payload.number)
                    .await
                    .with_context(|| {
                        format!("Failed to fetch closed pull request #{}", payload.number)
                    })?;
                let plan = plan_full_cleanup(&pull_request, self.config);
                self.apply_label_plan(pull_request.number, &plan).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Scan flow: find every open PR carrying a control label.
    async fn handle_scan_event(&self) -> Result<()> {
        let searched = self.config.control_labels();
        if searched.is_empty() {
            info!("No control labels configured, nothing to scan for");
            return Ok(());
        }

        info!(labels = ?searched, "Searching for open pull requests with control labels");
        let pull_requests = self
            .gateway
            .search_open_pull_requests_by_label(&searched)
            .await
            .context("Label search over open pull requests failed")?;

        if pull_requests.is_empty() {
            info!("No pull requests found");
            return Ok(());
        }
        info!(count = pull_requests.len(), "Found pull requests with matching labels");

        let passes = pull_requests.iter().filter_map(|pr| {
            let condition = if self
                .config
                .once_label
                .as_ref()
                .is_some_and(|once| pr.labels.iter().any(|l| l == once))
            {
                RerunCondition::Always
            } else if self
                .config
                .continuous_label
                .as_ref()
                .is_some_and(|continuous| pr.labels.iter().any(|l| l == continuous))
            {
                RerunCondition::OnFailure
            } else {
                return None;
            };
            Some((pr.number, condition))
        });

        let results = join_all(
            passes.map(|(number, condition)| self.process_pull_request(number, condition)),
        )
        .await;

        for err in results.into_iter().filter_map(Result::err) {
            warn!(error = %format!("{err:#}"), "Processing a pull request failed during scan");
        }

        Ok(())
    }

    /// Callback flow: a watched workflow run completed; clean up labels
    /// on the PRs it belongs to.
    async fn handle_workflow_run_event(&self, context: &EventContext) -> Result<()> {
        let payload = context.workflow_run_payload()?;
        if payload.action != "completed" {
            return Ok(());
        }

        let run = &payload.workflow_run;
        if !PULL_REQUEST_EVENTS.contains(&run.event.as_str()) {
            return Ok(());
        }
        if !run.is_successful_or_cancelled() {
            return Ok(());
        }

        let mut numbers: Vec<u64> = run.pull_requests.iter().map(|pr| pr.number).collect();

        if numbers.is_empty() {
            // Fork PRs often come without embedded references; resolve
            // them through the head branch of the originating repo.
            let Some(head_owner) = run.head_owner() else {
                warn!(run_id = run.id, "Workflow run has no pull requests and no head owner");
                return Ok(());
            };

            numbers = self
                .gateway
                .list_open_pull_requests_by_head(head_owner, &run.head_branch)
                .await
                .with_context(|| {
                    format!("Failed listing pull requests for workflow run {}", run.id)
                })?
                .into_iter()
                .filter(|pr| pr.head_sha == run.head_sha)
                .map(|pr| pr.number)
                .collect();
        }

        if numbers.is_empty() {
            warn!(run_id = run.id, "No pull requests found for workflow run");
            return Ok(());
        }
        info!(run_id = run.id, pull_requests = ?numbers, "Found pull requests for workflow run");

        let results = join_all(
            numbers
                .iter()
                .map(|&number| self.process_pull_request(number, RerunCondition::Never)),
        )
        .await;

        for err in results.into_iter().filter_map(Result::err) {
            warn!(
                error = %format!("{err:#}"),
                "Processing a pull request failed during workflow_run callback"
            );
        }

        Ok(())
    }

    /// One full pass over a single pull request.
    async fn process_pull_request(&self, number: u64, condition: RerunCondition) -> Result<()> {
        let pull_request = self
            .gateway
            .get_pull_request(number)
            .await
            .with_context(|| format!("Failed to fetch pull request #{number}"))?;

        let all_runs = self
            .gateway
            .list_workflow_runs(&self.config.workflow, &pull_request.head_ref)
            .await
            .with_context(|| format!("Failed listing workflow runs for #{number}"))?;

        let selected = select_latest_runs(&all_runs, &pull_request);
        let reruns_issued = self.issue_reruns(&selected, condition).await;

        let plan = plan_removals(&pull_request, &selected, reruns_issued, self.config);
        self.apply_label_plan(pull_request.number, &plan).await;

        Ok(())
    }

    /// Decide per run and fire the reruns, joined before returning so
    /// the count the label manager sees reflects attempted reruns.
    async fn issue_reruns(&self, selected: &[WorkflowRun], condition: RerunCondition) -> usize {
        let mut targets: Vec<&WorkflowRun> = Vec::new();

        for run in selected {
            match decide(run, condition) {
                RunAction::Rerun => targets.push(run),
                RunAction::AlreadyActive => {
                    info!(run_id = run.id, status = %run.status, "Workflow run is already active");
                }
                RunAction::TerminalOk => {
                    info!(
                        run_id = run.id,
                        conclusion = %run.conclusion.map_or_else(|| "none".to_string(), |c| c.to_string()),
                        "Workflow run needs no retry"
                    );
                }
                RunAction::Skipped => {}
                RunAction::Unsupported => {
                    warn!(
                        run_id = run.id,
                        status = %run.status,
                        conclusion = ?run.conclusion,
                        "Unsupported workflow run state"
                    );
                }
            }
        }

        let results = if self.config.failed_jobs_only {
            join_all(
                targets
                    .iter()
                    .map(|run| self.gateway.rerun_failed_jobs(run.id)),
            )
            .await
        } else {
            join_all(
                targets
                    .iter()
                    .map(|run| self.gateway.rerun_workflow(run.id)),
            )
            .await
        };

        for (run, result) in targets.iter().zip(results) {
            match result {
                Ok(()) => info!(run_id = run.id, "Triggered re-run for workflow run"),
                // Non-fatal: the run stays in its failed state and the
                // next scan pass picks it up again.
                Err(err) => warn!(run_id = run.id, error = %err, "Re-running workflow run failed"),
            }
        }

        targets.len()
    }

    /// Apply planned label removals, in plan order. Failures are logged
    /// with the PR and label and never abort the pass.
    async fn apply_label_plan(&self, number: u64, plan: &LabelPlan) {
        for label in &plan.remove {
            info!(pr_number = number, label = %label, "Removing label from pull request");
            if let Err(err) = self.gateway.remove_label(number, label).await {
                warn!(
                    pr_number = number,
                    label = %label,
                    error = %err,
                    "Failed removing label from pull request"
                );
            }
        }
    }
}
