//! Authorization canaries: expected decisions checked against the live store.
//!
//! The combined case list is the caller's file (when present), then the
//! built-in base-deny cases, then the built-in action-enforcement cases
//! (unless action groups are off). Every failure is collected; diagnostics
//! refer to the 1-based position in the combined list.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use verified_permissions_sdk::{
    ActionRef, AuthorizationClient, AuthorizationRequest, AuthorizationResponse, Decision,
    EntityRef, PolicyStoreError,
};

use super::action_groups::ActionGroupMode;
use super::error::DomainError;
use super::policies::render_template;
use super::schema::{DocumentFormat, parse_document};

/// Canary file locations tried when none is configured, in order.
pub const DEFAULT_CANARY_FILES: [&str; 2] =
    ["./authorizer/canaries.yaml", "./authorize/canaries.yaml"];

const BASE_DENY_CASES: &str = include_str!("../../assets/canaries/base-deny.yaml");
const ACTION_ENFORCEMENT_CASES: &str = include_str!("../../assets/canaries/action-enforcement.yaml");

/// One expected authorization decision.
#[derive(Debug, Clone, PartialEq, Deserialize)]
/// Unknown keys (`name`, `description`, ...) are ignored.
#[serde(rename_all = "camelCase")]
pub struct CanaryCase {
    pub principal: EntityRef,
    pub action: String,
    /// Action entity type; defaults to `<namespace>::Action`.
    #[serde(default)]
    pub action_type: Option<String>,
    pub resource: EntityRef,
    pub expect: Decision,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
}

impl CanaryCase {
    /// Decision request for this case.
    #[must_use]
    pub fn to_request(&self, default_action_type: &str) -> AuthorizationRequest {
        let action_type = self.action_type.as_deref().unwrap_or(default_action_type);
        AuthorizationRequest::new(
            self.principal.clone(),
            ActionRef::new(action_type, self.action.as_str()),
            self.resource.clone(),
        )
        .with_context(self.context.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CanaryDocument {
    #[serde(default)]
    cases: Option<Vec<CanaryCase>>,
}

/// Action entity type used when a case does not name one.
#[must_use]
pub fn default_action_type(namespace: &str) -> String {
    if namespace.is_empty() {
        "Action".to_owned()
    } else {
        format!("{namespace}::Action")
    }
}

/// Parses canary cases from document text. An empty document has no cases.
///
/// # Errors
///
/// `Parse` when the text is malformed or a case lacks a required field.
pub fn parse_canary_cases(
    origin: &Path,
    text: &str,
    format: DocumentFormat,
) -> Result<Vec<CanaryCase>, DomainError> {
    let value = parse_document(origin, text, format)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    let document: CanaryDocument =
        serde_json::from_value(value).map_err(|e| DomainError::parse(origin, e.to_string()))?;
    Ok(document.cases.unwrap_or_default())
}

/// # Errors
///
/// `Io`, `UnsupportedFormat` or `Parse` for an unusable file.
pub fn load_canary_file(path: &Path) -> Result<Vec<CanaryCase>, DomainError> {
    let format = DocumentFormat::from_path(path)?;
    let text = std::fs::read_to_string(path).map_err(|e| DomainError::io(path, e))?;
    parse_canary_cases(path, &text, format)
}

/// Caller canary file to use: the configured path if it exists, otherwise
/// the first existing default location.
#[must_use]
pub fn resolve_canary_file(configured: Option<&Path>) -> Option<PathBuf> {
    match configured {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            tracing::debug!(path = %path.display(), "configured canary file not present");
            None
        }
        None => DEFAULT_CANARY_FILES
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file()),
    }
}

/// Built-in cases for `namespace` under `mode`.
///
/// # Errors
///
/// `Parse` when an embedded case file is malformed.
pub fn builtin_cases(namespace: &str, mode: ActionGroupMode) -> Result<Vec<CanaryCase>, DomainError> {
    let mut cases = parse_canary_cases(
        Path::new("builtin/base-deny.yaml"),
        &render_template(BASE_DENY_CASES, namespace),
        DocumentFormat::Yaml,
    )?;
    if !mode.is_off() {
        cases.extend(parse_canary_cases(
            Path::new("builtin/action-enforcement.yaml"),
            &render_template(ACTION_ENFORCEMENT_CASES, namespace),
            DocumentFormat::Yaml,
        )?);
    }
    Ok(cases)
}

/// Caller cases followed by the built-in cases.
///
/// # Errors
///
/// See [`load_canary_file`] and [`builtin_cases`].
pub fn combined_cases(
    consumer_file: Option<&Path>,
    namespace: &str,
    mode: ActionGroupMode,
) -> Result<Vec<CanaryCase>, DomainError> {
    let mut cases = match consumer_file {
        Some(path) => load_canary_file(path)?,
        None => Vec::new(),
    };
    cases.extend(builtin_cases(namespace, mode)?);
    Ok(cases)
}

/// Why a canary case failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanaryFailureKind {
    /// The store answered with a different decision.
    Mismatch {
        actual: String,
        determining_policies: Vec<String>,
        /// Policy evaluation errors reported alongside the decision.
        errors: Vec<String>,
    },
    /// The decision request itself failed.
    Error(PolicyStoreError),
}

/// A failed canary case with enough detail to reproduce it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanaryFailure {
    /// 1-based position in the combined case list.
    pub index: usize,
    pub principal: EntityRef,
    pub action: ActionRef,
    pub resource: EntityRef,
    pub expected: Decision,
    pub kind: CanaryFailureKind,
}

impl fmt::Display for CanaryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CanaryFailureKind::Mismatch {
                actual,
                determining_policies,
                errors,
            } => {
                write!(
                    f,
                    "#{}: expected {}, got {actual} (principal={}, action={}, resource={})",
                    self.index, self.expected, self.principal, self.action, self.resource
                )?;
                if !determining_policies.is_empty() {
                    write!(f, " [determining policies: {}]", determining_policies.join(", "))?;
                }
                if !errors.is_empty() {
                    write!(f, " [evaluation errors: {}]", errors.join("; "))?;
                }
                Ok(())
            }
            CanaryFailureKind::Error(err) => write!(
                f,
                "#{}: API error: {err} (principal={}, action={}, resource={})",
                self.index, self.principal, self.action, self.resource
            ),
        }
    }
}

/// Aggregate outcome of a canary run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanaryReport {
    pub total: usize,
    /// Failures ordered by case index.
    pub failures: Vec<CanaryFailure>,
}

impl CanaryReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.total - self.failures.len()
    }
}

impl fmt::Display for CanaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "canaries passed ({}/{})", self.total, self.total);
        }
        write!(f, "canaries failed ({}/{}): ", self.failures.len(), self.total)?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

type CaseOutcome = (
    usize,
    AuthorizationRequest,
    Result<AuthorizationResponse, PolicyStoreError>,
);

/// Executes canary cases with bounded concurrency.
#[derive(Debug, Clone)]
pub struct CanaryRunner {
    concurrency: usize,
}

impl Default for CanaryRunner {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl CanaryRunner {
    /// A concurrency of zero is raised to one.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs every case and reports all failures.
    ///
    /// # Errors
    ///
    /// `Cancelled` when `cancel` fires before every case completed. Decision
    /// mismatches and failed requests are reported in the [`CanaryReport`].
    pub async fn run<C>(
        &self,
        client: &C,
        policy_store_id: &str,
        cases: &[CanaryCase],
        default_action_type: &str,
        cancel: &CancellationToken,
    ) -> Result<CanaryReport, DomainError>
    where
        C: AuthorizationClient + ?Sized,
    {
        let outcomes: Vec<Option<CaseOutcome>> =
            stream::iter(cases.iter().enumerate())
                .map(|(i, case)| {
                    let request = case.to_request(default_action_type);
                    async move {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => None,
                            result = client.is_authorized(policy_store_id, &request) => {
                                Some((i, request, result))
                            }
                        }
                    }
                })
                .buffered(self.concurrency)
                .collect()
                .await;

        let mut report = CanaryReport {
            total: cases.len(),
            failures: Vec::new(),
        };
        for (outcome, case) in outcomes.into_iter().zip(cases) {
            let Some((i, request, result)) = outcome else {
                return Err(DomainError::Cancelled);
            };
            let kind = match result {
                Ok(response) if response.parsed_decision() == Some(case.expect) => continue,
                Ok(response) => CanaryFailureKind::Mismatch {
                    actual: response.decision,
                    determining_policies: response.determining_policies,
                    errors: response.errors,
                },
                Err(err) => CanaryFailureKind::Error(err),
            };
            report.failures.push(CanaryFailure {
                index: i + 1,
                principal: request.principal,
                action: request.action,
                resource: request.resource,
                expected: case.expect,
                kind,
            });
        }
        Ok(report)
    }
}

/// Merges caller and built-in cases and runs them against the store.
///
/// An empty combined list succeeds without calling the store.
///
/// # Errors
///
/// - errors of [`combined_cases`] for unusable case files
/// - `CanaryFailures` carrying the report when any case failed
/// - `Cancelled` when `cancel` fires
#[tracing::instrument(skip_all, fields(policy_store_id = %policy_store_id, mode = %mode))]
pub async fn run_combined_canaries<C>(
    client: &C,
    policy_store_id: &str,
    consumer_file: Option<&Path>,
    namespace: &str,
    mode: ActionGroupMode,
    runner: &CanaryRunner,
    cancel: &CancellationToken,
) -> Result<CanaryReport, DomainError>
where
    C: AuthorizationClient + ?Sized,
{
    let cases = combined_cases(consumer_file, namespace, mode)?;
    if cases.is_empty() {
        tracing::info!("no canary cases");
        return Ok(CanaryReport::default());
    }

    let report = runner
        .run(
            client,
            policy_store_id,
            &cases,
            &default_action_type(namespace),
            cancel,
        )
        .await?;

    if report.passed() {
        tracing::info!(total = report.total, "canaries passed");
        Ok(report)
    } else {
        tracing::error!(
            failed = report.failures.len(),
            total = report.total,
            "canaries failed"
        );
        Err(DomainError::CanaryFailures(report))
    }
}
