//! Validated runtime configuration.
//!
//! Built once per invocation from the action inputs, then never
//! mutated. Validation happens before any network call.

use thiserror::Error;
use tracing::warn;

/// Contradictory or incomplete control-label setup. Fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("one of `once-label`, `continuous-label` or `trigger-labels` must be specified")]
    NoControlLabels,

    #[error("`once-label` and `continuous-label` cannot have the same value")]
    SameControlLabel,

    #[error("`repository` must be in `owner/name` form, got '{0}'")]
    InvalidRepository(String),
}

/// Immutable configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// API credential
    pub token: String,
    /// One-shot retry label, consumed on every handling pass
    pub once_label: Option<String>,
    /// Keep-retrying-until-green label
    pub continuous_label: Option<String>,
    /// Labels whose addition/removal provokes an unconditional pass
    pub trigger_labels: Vec<String>,
    /// Workflow identifier or filename whose runs are managed
    pub workflow: String,
    /// Re-run only a run's failed jobs instead of the whole run
    pub failed_jobs_only: bool,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
}

impl Config {
    /// Build and validate a configuration from raw inputs.
    ///
    /// Empty strings are treated as absent. Trigger labels that
    /// coincide with a control label are dropped with a warning, so a
    /// trigger label can never double as a control label.
    ///
    /// # Errors
    /// Returns `ConfigError` when no control signal is configured, when
    /// both control labels share a value, or when the repository is not
    /// in `owner/name` form.
    pub fn new(
        token: String,
        once_label: Option<String>,
        continuous_label: Option<String>,
        trigger_labels: Option<String>,
        workflow: String,
        failed_jobs_only: bool,
        repository: &str,
    ) -> Result<Self, ConfigError> {
        let once_label = once_label.filter(|l| !l.is_empty());
        let continuous_label = continuous_label.filter(|l| !l.is_empty());

        let mut trigger_labels: Vec<String> = trigger_labels
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect();

        if once_label.is_none() && continuous_label.is_none() && trigger_labels.is_empty() {
            return Err(ConfigError::NoControlLabels);
        }

        if let (Some(once), Some(continuous)) = (&once_label, &continuous_label) {
            if once == continuous {
                return Err(ConfigError::SameControlLabel);
            }
        }

        for control in [&once_label, &continuous_label].into_iter().flatten() {
            if trigger_labels.iter().any(|l| l == control) {
                warn!(label = %control, "Removed control label from `trigger-labels`");
                trigger_labels.retain(|l| l != control);
            }
        }

        let (owner, repo) = repository
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty())
            .ok_or_else(|| ConfigError::InvalidRepository(repository.to_string()))?;

        Ok(Self {
            token,
            once_label,
            continuous_label,
            trigger_labels,
            workflow,
            failed_jobs_only,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    /// Control labels that are actually configured, once-label first.
    #[must_use]
    pub fn control_labels(&self) -> Vec<String> {
        [&self.once_label, &self.continuous_label]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}
