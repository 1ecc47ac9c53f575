//! Event context and typed payload views.
//!
//! The Actions runtime hands us an event name and a JSON payload file.
//! The context is loaded once in `main` and passed explicitly into
//! every flow; nothing reads it ambiently.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::types::{RunConclusion, RunStatus};

/// The event that triggered this invocation.
#[derive(Debug, Clone)]
pub struct EventContext {
    /// Event name ("pull_request", "schedule", "workflow_run", ...)
    pub event_name: String,
    /// Raw event payload
    pub payload: serde_json::Value,
}

impl EventContext {
    /// Load the context from the Actions runtime files.
    ///
    /// # Errors
    /// Returns an error when the payload file cannot be read or is not
    /// valid JSON.
    pub fn load(event_name: String, event_path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(event_path)
            .with_context(|| format!("Failed to read event payload {}", event_path.display()))?;
        let payload = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed event payload {}", event_path.display()))?;

        Ok(Self {
            event_name,
            payload,
        })
    }

    /// Typed view for `pull_request` / `pull_request_target` payloads.
    ///
    /// # Errors
    /// Returns an error when the payload does not match the expected
    /// shape.
    pub fn pull_request_payload(&self) -> Result<PullRequestPayload> {
        serde_json::from_value(self.payload.clone())
            .context("Malformed pull_request event payload")
    }

    /// Typed view for `workflow_run` payloads.
    ///
    /// # Errors
    /// Returns an error when the payload does not match the expected
    /// shape.
    pub fn workflow_run_payload(&self) -> Result<WorkflowRunPayload> {
        serde_json::from_value(self.payload.clone()).context("Malformed workflow_run event payload")
    }
}

/// A label reference inside an event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelRef {
    pub name: String,
}

/// Payload of a `pull_request` / `pull_request_target` event.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    /// What happened ("labeled", "unlabeled", "closed", ...)
    pub action: String,
    /// The label involved, present for labeled/unlabeled actions
    pub label: Option<LabelRef>,
    /// The pull request number
    pub number: u64,
}

/// The run embedded in a `workflow_run` event payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunRef {
    pub id: u64,
    /// Event that triggered the run
    pub event: String,
    pub status: RunStatus,
    pub conclusion: Option<RunConclusion>,
    pub head_branch: String,
    pub head_sha: String,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestNumberRef>,
    #[serde(default)]
    pub head_repository: Option<RepositoryRef>,
}

/// Minimal PR reference embedded in a workflow run payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestNumberRef {
    pub number: u64,
}

/// Minimal repository reference embedded in a workflow run payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryRef {
    #[serde(default)]
    pub owner: Option<OwnerRef>,
}

/// Minimal owner reference.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRef {
    pub login: String,
}

/// Payload of a `workflow_run` event.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowRunPayload {
    /// What happened ("completed", "requested", ...)
    pub action: String,
    pub workflow_run: WorkflowRunRef,
}

impl WorkflowRunRef {
    /// Owner login of the head repository, if the payload carried one.
    #[must_use]
    pub fn head_owner(&self) -> Option<&str> {
        self.head_repository
            .as_ref()
            .and_then(|repo| repo.owner.as_ref())
            .map(|owner| owner.login.as_str())
    }

    /// True when the run completed with a success or cancelled
    /// conclusion.
    #[must_use]
    pub fn is_successful_or_cancelled(&self) -> bool {
        self.status == RunStatus::Completed
            && matches!(
                self.conclusion,
                Some(RunConclusion::Success | RunConclusion::Cancelled)
            )
    }
}
