//! Guardrail and static policy installation.
//!
//! Install order is fixed: the base guardrail, the action-enforcement
//! guardrail (unless action groups are off), then the caller's `.cedar` files
//! sorted by relative path.
//!
//! Every installed policy carries a managed description
//! `avp-managed:<fingerprint>:<name>`. A policy whose fingerprint is already
//! present is skipped, which makes re-running against unchanged inputs a no-op.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use verified_permissions_sdk::{NewStaticPolicy, PolicyClient};
use walkdir::WalkDir;

use super::action_groups::ActionGroupMode;
use super::error::DomainError;

/// Placeholder replaced with the schema namespace in embedded assets.
pub const NAMESPACE_PLACEHOLDER: &str = "${NAMESPACE}";

/// Prefix of descriptions of policies owned by this installer.
pub const MANAGED_PREFIX: &str = "avp-managed";

/// Policy descriptions are limited to this many characters by the store.
const DESCRIPTION_LIMIT: usize = 150;

/// Hex characters of the SHA-256 digest kept in a fingerprint.
const FINGERPRINT_LEN: usize = 32;

const POLICY_EXTENSION: &str = "cedar";

pub const BASE_GUARDRAIL_NAME: &str = "guardrail/base";
pub const ACTION_ENFORCEMENT_GUARDRAIL_NAME: &str = "guardrail/action-enforcement";

const BASE_GUARDRAIL: &str = include_str!("../../assets/guardrails/base.cedar");
const ACTION_ENFORCEMENT_GUARDRAIL: &str =
    include_str!("../../assets/guardrails/action-enforcement.cedar");

#[allow(clippy::expect_used)]
static STATEMENT_HEAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(permit|forbid)\s*\(\s*principal").expect("statement pattern is a valid literal")
});

/// Substitutes the namespace into an embedded template.
///
/// With an empty namespace, `${NAMESPACE}::` collapses so that type names stay
/// unqualified.
#[must_use]
pub fn render_template(template: &str, namespace: &str) -> String {
    if namespace.is_empty() {
        template
            .replace(&format!("{NAMESPACE_PLACEHOLDER}::"), "")
            .replace(NAMESPACE_PLACEHOLDER, "")
    } else {
        template.replace(NAMESPACE_PLACEHOLDER, namespace)
    }
}

/// Where a desired policy comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySource {
    Guardrail,
    File(PathBuf),
}

/// A policy that should be present in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDocument {
    /// Stable name: `guardrail/<kind>` or the file path relative to the policy directory.
    pub name: String,
    pub statement: String,
    pub source: PolicySource,
}

impl PolicyDocument {
    pub fn new(name: impl Into<String>, statement: impl Into<String>, source: PolicySource) -> Self {
        Self {
            name: name.into(),
            statement: statement.into(),
            source,
        }
    }

    /// Truncated SHA-256 over name and statement.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.statement.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        digest.truncate(FINGERPRINT_LEN);
        digest
    }

    /// Managed description, cut to the store's length limit.
    #[must_use]
    pub fn description(&self) -> String {
        let description = format!("{MANAGED_PREFIX}:{}:{}", self.fingerprint(), self.name);
        description.chars().take(DESCRIPTION_LIMIT).collect()
    }
}

/// Fingerprint of a managed description, `None` for foreign policies.
#[must_use]
pub fn managed_fingerprint(description: &str) -> Option<&str> {
    let mut parts = description.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(MANAGED_PREFIX), Some(fingerprint), Some(_)) if !fingerprint.is_empty() => {
            Some(fingerprint)
        }
        _ => None,
    }
}

/// Provider-authored guardrails for `namespace`, in install order.
#[must_use]
pub fn guardrail_policies(
    namespace: &str,
    mode: ActionGroupMode,
    disable_guardrails: bool,
) -> Vec<PolicyDocument> {
    let mut policies = Vec::with_capacity(2);
    if disable_guardrails {
        tracing::warn!("baseline guardrails are disabled; the default-deny posture is weakened");
    } else {
        policies.push(PolicyDocument::new(
            BASE_GUARDRAIL_NAME,
            render_template(BASE_GUARDRAIL, namespace),
            PolicySource::Guardrail,
        ));
    }
    if !mode.is_off() {
        policies.push(PolicyDocument::new(
            ACTION_ENFORCEMENT_GUARDRAIL_NAME,
            render_template(ACTION_ENFORCEMENT_GUARDRAIL, namespace),
            PolicySource::Guardrail,
        ));
    }
    policies
}

/// `.cedar` files under `dir`, recursively, in byte order of their full path.
///
/// # Errors
///
/// `PolicyDirectory` when `dir` is missing, not a directory, or cannot be walked.
pub fn collect_policy_files(dir: &Path) -> Result<Vec<PathBuf>, DomainError> {
    if !dir.is_dir() {
        return Err(DomainError::policy_directory(dir, "not found or not a directory"));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| DomainError::policy_directory(dir, e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(POLICY_EXTENSION))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

/// Reads every policy file under `dir` in install order.
///
/// # Errors
///
/// `PolicyDirectory` as in [`collect_policy_files`]; `Io` for unreadable files.
pub fn load_policy_files(dir: &Path) -> Result<Vec<PolicyDocument>, DomainError> {
    let files = collect_policy_files(dir)?;
    if files.is_empty() {
        tracing::warn!(dir = %dir.display(), "no .cedar policy files found");
    }
    files
        .into_iter()
        .map(|path| {
            let statement = std::fs::read_to_string(&path).map_err(|e| DomainError::io(&path, e))?;
            let name = relative_name(dir, &path);
            Ok(PolicyDocument::new(name, statement, PolicySource::File(path)))
        })
        .collect()
}

fn relative_name(dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Policies that do not look like a Cedar `permit`/`forbid` statement.
#[must_use]
pub fn check_policy_statements(policies: &[PolicyDocument]) -> Vec<String> {
    policies
        .iter()
        .filter(|p| !STATEMENT_HEAD_RE.is_match(&p.statement))
        .map(|p| format!("{}: does not appear to contain a Cedar policy statement", p.name))
        .collect()
}

/// A policy created during installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPolicy {
    pub name: String,
    pub policy_id: String,
}

/// Outcome of [`install_policies`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub created: Vec<InstalledPolicy>,
    /// Names of desired policies already present.
    pub unchanged: Vec<String>,
    /// Ids of managed policies deleted because they are no longer desired.
    pub pruned: Vec<String>,
}

impl InstallReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.pruned.is_empty()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} unchanged, {} pruned",
            self.created.len(),
            self.unchanged.len(),
            self.pruned.len()
        )
    }
}

/// Installs `desired` policies in order and prunes stale managed ones.
///
/// Policies created before a failure stay in place; re-running picks up
/// where the failed run stopped. Pruning starts only after every creation
/// succeeded. Policies without a managed description are never touched.
///
/// # Errors
///
/// - `PolicyStore` for any failed list, create or delete call
/// - `Cancelled` when `cancel` fires between calls
#[tracing::instrument(skip_all, fields(policy_store_id = %policy_store_id, desired = desired.len()))]
pub async fn install_policies<C>(
    client: &C,
    policy_store_id: &str,
    desired: &[PolicyDocument],
    prune: bool,
    cancel: &CancellationToken,
) -> Result<InstallReport, DomainError>
where
    C: PolicyClient + ?Sized,
{
    let existing = client.list_policies(policy_store_id).await?;
    let mut managed: HashMap<String, Vec<String>> = HashMap::new();
    for policy in &existing {
        if let Some(fingerprint) = policy.description.as_deref().and_then(managed_fingerprint) {
            managed
                .entry(fingerprint.to_owned())
                .or_default()
                .push(policy.policy_id.clone());
        }
    }

    let mut report = InstallReport::default();
    let mut wanted = HashSet::with_capacity(desired.len());

    for policy in desired {
        let fingerprint = policy.fingerprint();
        if managed.contains_key(&fingerprint) {
            tracing::debug!(name = %policy.name, "policy unchanged");
            report.unchanged.push(policy.name.clone());
        } else {
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            let policy_id = client
                .create_policy(
                    policy_store_id,
                    NewStaticPolicy {
                        statement: policy.statement.clone(),
                        description: Some(policy.description()),
                    },
                )
                .await?;
            tracing::info!(name = %policy.name, policy_id = %policy_id, "policy created");
            report.created.push(InstalledPolicy {
                name: policy.name.clone(),
                policy_id,
            });
        }
        wanted.insert(fingerprint);
    }

    if prune {
        let mut stale: Vec<&String> = managed
            .iter()
            .filter(|(fingerprint, _)| !wanted.contains(*fingerprint))
            .flat_map(|(_, ids)| ids)
            .collect();
        stale.sort();
        for policy_id in stale {
            if cancel.is_cancelled() {
                return Err(DomainError::Cancelled);
            }
            client.delete_policy(policy_store_id, policy_id).await?;
            tracing::warn!(policy_id = %policy_id, "stale managed policy deleted");
            report.pruned.push(policy_id.clone());
        }
    }

    tracing::info!(%report, "policies installed");
    Ok(report)
}
