//! Convergence pipeline.
//!
//! Local inputs are loaded and validated before any remote call, so a bad
//! schema or policy file never leaves the store half-updated. Remote steps run
//! in dependency order: schema, then policies, then canaries.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use verified_permissions_sdk::PolicyStoreClient;

use super::action_groups::{ActionGroupGovernor, ActionGroupMode};
use super::canaries::{CanaryReport, load_canary_file, resolve_canary_file, run_combined_canaries};
use super::error::DomainError;
use super::policies::{
    InstallReport, PolicyDocument, check_policy_statements, guardrail_policies, install_policies,
    load_policy_files,
};
use super::schema::{LoadedSchema, load_and_validate_schema_with};
use super::sync::{SchemaSyncOutcome, put_schema_if_changed};
use crate::config::VerifiedPermissionsConfig;

/// Validated local inputs of one convergence run.
#[derive(Debug, Clone)]
pub struct DesiredState {
    pub schema: LoadedSchema,
    /// Guardrails followed by policy files, in install order.
    pub policies: Vec<PolicyDocument>,
    pub action_violations: Vec<String>,
    pub policy_issues: Vec<String>,
}

/// Loads the schema and policies and applies the configured checks.
///
/// # Errors
///
/// Any validation error of the schema, the action names (in `error` mode) or
/// the policy files (in `error` mode).
pub fn load_desired_state(config: &VerifiedPermissionsConfig) -> Result<DesiredState, DomainError> {
    let governor = ActionGroupGovernor::new(config.action_group_catalog()?);
    let mode = config.action_group_enforcement;

    let schema =
        load_and_validate_schema_with(&config.schema_file, config.namespace_override.as_deref())?;
    for warning in &schema.warnings {
        tracing::warn!(warning = %warning, "schema warning");
    }

    let action_violations = governor.enforce(&schema.actions, mode)?;

    let files = load_policy_files(&config.policy_dir)?;
    let policy_issues = check_policy_statements(&files);
    if !policy_issues.is_empty() {
        if mode == ActionGroupMode::Error {
            return Err(DomainError::PolicySyntax {
                issues: policy_issues,
            });
        }
        tracing::warn!(issues = ?policy_issues, "policy syntax issues");
    }

    let mut policies = guardrail_policies(&schema.namespace, mode, config.disable_guardrails);
    policies.extend(files);

    Ok(DesiredState {
        schema,
        policies,
        action_violations,
        policy_issues,
    })
}

/// Result of an offline validation.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub namespace: String,
    pub actions: usize,
    /// Caller policy files, guardrails excluded.
    pub policy_files: usize,
    pub canary_cases: usize,
    pub action_violations: Vec<String>,
    pub policy_issues: Vec<String>,
    pub warnings: Vec<String>,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OK: {} with {} actions, {} policies, {} canary cases",
            self.namespace, self.actions, self.policy_files, self.canary_cases
        )
    }
}

/// Checks schema, action names, policy files and the canary file without
/// contacting the policy store.
///
/// # Errors
///
/// See [`load_desired_state`]; canary file errors are reported as well.
#[tracing::instrument(skip_all)]
pub fn validate_offline(config: &VerifiedPermissionsConfig) -> Result<ValidationReport, DomainError> {
    config.validate()?;
    let desired = load_desired_state(config)?;

    let canary_cases = match resolve_canary_file(config.canary_file.as_deref()) {
        Some(path) => load_canary_file(&path)?.len(),
        None => 0,
    };

    let policy_files = desired
        .policies
        .iter()
        .filter(|p| matches!(p.source, super::policies::PolicySource::File(_)))
        .count();

    Ok(ValidationReport {
        namespace: desired.schema.namespace,
        actions: desired.schema.actions.len(),
        policy_files,
        canary_cases,
        action_violations: desired.action_violations,
        policy_issues: desired.policy_issues,
        warnings: desired.schema.warnings,
    })
}

/// Outcome of [`Converger::converge`].
#[derive(Debug, Clone)]
pub struct ConvergeReport {
    pub namespace: String,
    pub schema: SchemaSyncOutcome,
    pub policies: InstallReport,
    /// `None` when canaries are disabled.
    pub canaries: Option<CanaryReport>,
}

/// Drives one policy store towards the configured desired state.
pub struct Converger {
    client: Arc<dyn PolicyStoreClient>,
    policy_store_id: String,
    config: VerifiedPermissionsConfig,
}

impl fmt::Debug for Converger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converger")
            .field("policy_store_id", &self.policy_store_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Converger {
    /// # Errors
    ///
    /// `InvalidConfig` for an empty store id or an invalid configuration.
    pub fn new(
        client: Arc<dyn PolicyStoreClient>,
        policy_store_id: impl Into<String>,
        config: VerifiedPermissionsConfig,
    ) -> Result<Self, DomainError> {
        let policy_store_id = policy_store_id.into();
        if policy_store_id.trim().is_empty() {
            return Err(DomainError::invalid_config("policy store id is empty"));
        }
        config.validate()?;
        Ok(Self {
            client,
            policy_store_id,
            config,
        })
    }

    #[must_use]
    pub fn policy_store_id(&self) -> &str {
        &self.policy_store_id
    }

    #[must_use]
    pub const fn config(&self) -> &VerifiedPermissionsConfig {
        &self.config
    }

    /// Validates local inputs, then syncs the schema, installs policies and
    /// runs canaries.
    ///
    /// # Errors
    ///
    /// - validation errors before anything is written
    /// - `PolicyStore` for remote failures, unmodified
    /// - `CanaryFailures` when any canary case fails
    /// - `Cancelled` when `cancel` fires; no further writes are started
    #[tracing::instrument(skip_all, fields(policy_store_id = %self.policy_store_id))]
    pub async fn converge(&self, cancel: &CancellationToken) -> Result<ConvergeReport, DomainError> {
        let desired = load_desired_state(&self.config)?;
        ensure_active(cancel)?;

        let schema = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DomainError::Cancelled),
            outcome = put_schema_if_changed(
                self.client.as_ref(),
                &self.policy_store_id,
                &desired.schema.cedar_json,
            ) => outcome?,
        };
        ensure_active(cancel)?;

        let policies = install_policies(
            self.client.as_ref(),
            &self.policy_store_id,
            &desired.policies,
            self.config.prune_managed_policies,
            cancel,
        )
        .await?;

        let canaries = if self.config.run_canaries {
            ensure_active(cancel)?;
            Some(self.run_canaries_for(&desired.schema.namespace, cancel).await?)
        } else {
            tracing::info!("canaries disabled");
            None
        };

        tracing::info!(
            schema_applied = schema.is_applied(),
            policies = %policies,
            "policy store converged"
        );
        Ok(ConvergeReport {
            namespace: desired.schema.namespace,
            schema,
            policies,
            canaries,
        })
    }

    /// Runs the combined canaries only, using the namespace of the
    /// configured schema.
    ///
    /// # Errors
    ///
    /// Schema validation errors, `CanaryFailures`, `Cancelled`.
    pub async fn run_canaries(&self, cancel: &CancellationToken) -> Result<CanaryReport, DomainError> {
        let schema = load_and_validate_schema_with(
            &self.config.schema_file,
            self.config.namespace_override.as_deref(),
        )?;
        self.run_canaries_for(&schema.namespace, cancel).await
    }

    async fn run_canaries_for(
        &self,
        namespace: &str,
        cancel: &CancellationToken,
    ) -> Result<CanaryReport, DomainError> {
        let consumer_file = resolve_canary_file(self.config.canary_file.as_deref());
        run_combined_canaries(
            self.client.as_ref(),
            &self.policy_store_id,
            consumer_file.as_deref(),
            namespace,
            self.config.action_group_enforcement,
            &self.config.canary_runner(),
            cancel,
        )
        .await
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), DomainError> {
    if cancel.is_cancelled() {
        Err(DomainError::Cancelled)
    } else {
        Ok(())
    }
}
