//! Configuration for the Verified Permissions module.

use std::path::PathBuf;

use serde::Deserialize;

use crate::domain::action_groups::{ActionGroupCatalog, ActionGroupMode};
use crate::domain::canaries::CanaryRunner;
use crate::domain::error::DomainError;

/// Configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifiedPermissionsConfig {
    /// Schema document (`.yaml`, `.yml` or `.json`).
    pub schema_file: PathBuf,
    /// Directory searched recursively for `.cedar` policy files.
    pub policy_dir: PathBuf,
    pub action_group_enforcement: ActionGroupMode,
    /// Replacement for the default canonical action-group prefixes.
    pub action_groups: Option<Vec<String>>,
    /// Skip the baseline deny guardrail. Logged as a warning.
    pub disable_guardrails: bool,
    /// Caller canary file; default locations are tried when unset.
    pub canary_file: Option<PathBuf>,
    pub run_canaries: bool,
    /// Maximum number of decision requests in flight during a canary run.
    pub canary_concurrency: usize,
    /// Delete managed policies that are no longer desired.
    pub prune_managed_policies: bool,
    /// Strict namespace that replaces the schema's own top-level key.
    pub namespace_override: Option<String>,
}

impl Default for VerifiedPermissionsConfig {
    fn default() -> Self {
        Self {
            schema_file: PathBuf::from("./authorizer/schema.yaml"),
            policy_dir: PathBuf::from("./authorizer/policies"),
            action_group_enforcement: ActionGroupMode::Error,
            action_groups: None,
            disable_guardrails: false,
            canary_file: None,
            run_canaries: true,
            canary_concurrency: 4,
            prune_managed_policies: true,
            namespace_override: None,
        }
    }
}

impl VerifiedPermissionsConfig {
    /// # Errors
    ///
    /// `InvalidConfig` for a zero canary concurrency or an unusable catalog.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.canary_concurrency == 0 {
            return Err(DomainError::invalid_config(
                "canary_concurrency must be at least 1",
            ));
        }
        self.action_group_catalog().map(|_| ())
    }

    /// Configured catalog, or the default one.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an empty catalog or an empty prefix.
    pub fn action_group_catalog(&self) -> Result<ActionGroupCatalog, DomainError> {
        match &self.action_groups {
            Some(prefixes) => ActionGroupCatalog::new(prefixes.iter().cloned()),
            None => Ok(ActionGroupCatalog::default()),
        }
    }

    #[must_use]
    pub fn canary_runner(&self) -> CanaryRunner {
        CanaryRunner::new(self.canary_concurrency)
    }
}
