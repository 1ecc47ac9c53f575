//! GitHub REST gateway.
//!
//! The [`RepoGateway`] trait is the capability boundary the rest of the
//! tool works against; [`GithubClient`] is the reqwest-backed
//! implementation. Label removal is idempotent: removing an absent
//! label is a success, never an error.

use async_trait::async_trait;
use reqwest::{header, Client as HttpClient, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::types::{PullRequest, RunConclusion, RunStatus, WorkflowRun};

/// Errors from the GitHub API boundary.
#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("re-run of workflow run {run_id} was rejected: {status} - {message}")]
    RerunRejected {
        run_id: u64,
        status: u16,
        message: String,
    },

    #[error("failed removing label '{label}' from pull request #{number}: {status} - {message}")]
    LabelRemoval {
        number: u64,
        label: String,
        status: u16,
        message: String,
    },
}

/// An open pull request as returned by a label search.
#[derive(Debug, Clone)]
pub struct LabeledPullRequest {
    pub number: u64,
    pub labels: Vec<String>,
}

/// An open pull request as returned by a head-branch listing.
#[derive(Debug, Clone)]
pub struct HeadPullRequest {
    pub number: u64,
    pub head_sha: String,
}

/// Capability interface over the hosting repository.
#[async_trait]
pub trait RepoGateway: Send + Sync {
    /// Fetch a pull request snapshot by number.
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest, GithubError>;

    /// List runs of the configured workflow on a branch.
    async fn list_workflow_runs(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, GithubError>;

    /// Trigger a re-run of a whole workflow run.
    async fn rerun_workflow(&self, run_id: u64) -> Result<(), GithubError>;

    /// Trigger a re-run of only the failed jobs of a workflow run.
    async fn rerun_failed_jobs(&self, run_id: u64) -> Result<(), GithubError>;

    /// Remove a label from a pull request. Removing an absent label is
    /// a no-op success.
    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GithubError>;

    /// Open pull requests carrying any of the given labels.
    async fn search_open_pull_requests_by_label(
        &self,
        labels: &[String],
    ) -> Result<Vec<LabeledPullRequest>, GithubError>;

    /// Open pull requests whose head is `owner:branch`.
    async fn list_open_pull_requests_by_head(
        &self,
        owner: &str,
        branch: &str,
    ) -> Result<Vec<HeadPullRequest>, GithubError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LabelBody {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HeadBody {
    #[serde(rename = "ref")]
    ref_field: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullBody {
    number: u64,
    head: HeadBody,
    #[serde(default)]
    labels: Vec<LabelBody>,
}

#[derive(Debug, Deserialize)]
struct PullRequestNumberBody {
    number: u64,
}

#[derive(Debug, Deserialize)]
struct OwnerBody {
    login: String,
}

#[derive(Debug, Deserialize)]
struct HeadRepositoryBody {
    #[serde(default)]
    owner: Option<OwnerBody>,
}

#[derive(Debug, Deserialize)]
struct RunBody {
    id: u64,
    event: String,
    status: RunStatus,
    conclusion: Option<RunConclusion>,
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pull_requests: Vec<PullRequestNumberBody>,
    head_branch: String,
    head_sha: String,
    #[serde(default)]
    head_repository: Option<HeadRepositoryBody>,
}

#[derive(Debug, Deserialize)]
struct RunListBody {
    workflow_runs: Vec<RunBody>,
}

#[derive(Debug, Deserialize)]
struct SearchItemBody {
    number: u64,
    #[serde(default)]
    labels: Vec<LabelBody>,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    items: Vec<SearchItemBody>,
}

impl From<RunBody> for WorkflowRun {
    fn from(body: RunBody) -> Self {
        Self {
            id: body.id,
            event: body.event,
            status: body.status,
            conclusion: body.conclusion,
            updated_at: body.updated_at,
            pull_requests: body.pull_requests.into_iter().map(|pr| pr.number).collect(),
            head_branch: body.head_branch,
            head_sha: body.head_sha,
            head_owner: body
                .head_repository
                .and_then(|repo| repo.owner)
                .map(|owner| owner.login),
        }
    }
}

/// GitHub REST client for one repository.
#[derive(Clone)]
pub struct GithubClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
    owner: String,
    repo: String,
}

impl GithubClient {
    /// Create a client for the configured repository.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self, GithubError> {
        let http_client = HttpClient::builder()
            .user_agent("requeue/0.2")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            base_url: "https://api.github.com".to_string(),
            token: config.token.clone(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
        })
    }

    /// Point the client at a different API root (for tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::ACCEPT, "application/vnd.github+json")
    }

    /// Decode an error response into its status and message.
    async fn error_parts(response: Response) -> Result<(u16, String), GithubError> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map_or(text, |body| body.message);
        Ok((status, message))
    }

    async fn api_error(response: Response) -> GithubError {
        match Self::error_parts(response).await {
            Ok((status, message)) => GithubError::Api { status, message },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl RepoGateway for GithubClient {
    #[instrument(skip(self), fields(pr_number = %number))]
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest, GithubError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.base_url, self.owner, self.repo, number
        );

        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let pull: PullBody = response.json().await?;
        debug!(
            head_ref = %pull.head.ref_field,
            head_sha = %pull.head.sha,
            "Fetched pull request"
        );

        Ok(PullRequest {
            number: pull.number,
            head_ref: pull.head.ref_field,
            head_sha: pull.head.sha,
            labels: pull.labels.into_iter().map(|label| label.name).collect(),
        })
    }

    #[instrument(skip(self), fields(workflow = %workflow, branch = %branch))]
    async fn list_workflow_runs(
        &self,
        workflow: &str,
        branch: &str,
    ) -> Result<Vec<WorkflowRun>, GithubError> {
        let url = format!(
            "{}/repos/{}/{}/actions/workflows/{}/runs",
            self.base_url, self.owner, self.repo, workflow
        );

        let response = self
            .request(reqwest::Method::GET, &url)
            .query(&[("branch", branch), ("per_page", "100")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: RunListBody = response.json().await?;
        debug!(count = list.workflow_runs.len(), "Listed workflow runs");

        Ok(list.workflow_runs.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(run_id = %run_id))]
    async fn rerun_workflow(&self, run_id: u64) -> Result<(), GithubError> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs/{}/rerun",
            self.base_url, self.owner, self.repo, run_id
        );

        let response = self.request(reqwest::Method::POST, &url).send().await?;
        if response.status().is_success() {
            info!("Re-run of workflow run {} successfully started", run_id);
            Ok(())
        } else {
            let (status, message) = Self::error_parts(response).await?;
            Err(GithubError::RerunRejected {
                run_id,
                status,
                message,
            })
        }
    }

    #[instrument(skip(self), fields(run_id = %run_id))]
    async fn rerun_failed_jobs(&self, run_id: u64) -> Result<(), GithubError> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs/{}/rerun-failed-jobs",
            self.base_url, self.owner, self.repo, run_id
        );

        let response = self.request(reqwest::Method::POST, &url).send().await?;
        if response.status().is_success() {
            info!("Re-run of failed jobs of workflow run {} successfully started", run_id);
            Ok(())
        } else {
            let (status, message) = Self::error_parts(response).await?;
            Err(GithubError::RerunRejected {
                run_id,
                status,
                message,
            })
        }
    }

    #[instrument(skip(self), fields(pr_number = %number, label = %label))]
    async fn remove_label(&self, number: u64, label: &str) -> Result<(), GithubError> {
        // The label becomes a path segment, so percent-encode it; a
        // label containing `/` would otherwise add an extra segment and
        // the resulting 404 would read as "already removed".
        let url = format!(
            "{}/repos/{}/{}/issues/{}/labels/{}",
            self.base_url,
            self.owner,
            self.repo,
            number,
            urlencoding::encode(label)
        );

        let response = self.request(reqwest::Method::DELETE, &url).send().await?;
        match response.status().as_u16() {
            status if response.status().is_success() => {
                debug!(status, "Removed label '{}' from PR #{}", label, number);
                Ok(())
            }
            404 => {
                // Already absent, which is fine for removal.
                debug!("Label '{}' not found on PR #{} (already removed)", label, number);
                Ok(())
            }
            _ => {
                let (status, message) = Self::error_parts(response).await?;
                Err(GithubError::LabelRemoval {
                    number,
                    label: label.to_string(),
                    status,
                    message,
                })
            }
        }
    }

    #[instrument(skip(self), fields(labels = ?labels))]
    async fn search_open_pull_requests_by_label(
        &self,
        labels: &[String],
    ) -> Result<Vec<LabeledPullRequest>, GithubError> {
        // The search API has no OR qualifier for labels, so run one
        // query per label and merge the results by PR number.
        let url = format!("{}/search/issues", self.base_url);
        let mut merged: BTreeMap<u64, LabeledPullRequest> = BTreeMap::new();

        for label in labels {
            let q = format!(
                "repo:{}/{} is:pr is:open label:\"{}\"",
                self.owner, self.repo, label
            );

            let response = self
                .request(reqwest::Method::GET, &url)
                .query(&[("q", q.as_str()), ("per_page", "100")])
                .send()
                .await?;
            if !response.status().is_success() {
                return Err(Self::api_error(response).await);
            }

            let results: SearchBody = response.json().await?;
            for item in results.items {
                merged.entry(item.number).or_insert_with(|| LabeledPullRequest {
                    number: item.number,
                    labels: item.labels.into_iter().map(|label| label.name).collect(),
                });
            }
        }

        debug!(count = merged.len(), "Found labeled open pull requests");
        Ok(merged.into_values().collect())
    }

    #[instrument(skip(self), fields(owner = %owner, branch = %branch))]
    async fn list_open_pull_requests_by_head(
        &self,
        owner: &str,
        branch: &str,
    ) -> Result<Vec<HeadPullRequest>, GithubError> {
        let url = format!("{}/repos/{}/{}/pulls", self.base_url, self.owner, self.repo);
        let head = format!("{owner}:{branch}");

        let response = self
            .request(reqwest::Method::GET, &url)
            .query(&[
                ("state", "open"),
                ("head", head.as_str()),
                ("sort", "updated"),
                ("direction", "desc"),
                ("per_page", "100"),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let pulls: Vec<PullBody> = response.json().await?;
        Ok(pulls
            .into_iter()
            .map(|pull| HeadPullRequest {
                number: pull.number,
                head_sha: pull.head.sha,
            })
            .collect())
    }
}
