//! Domain errors for the Verified Permissions module.

use std::path::{Path, PathBuf};

use verified_permissions_sdk::PolicyStoreError;

use super::canaries::CanaryReport;

/// Errors of schema loading, policy installation and canary execution.
///
/// Validation variants always carry the full list of offenders.
#[derive(thiserror::Error, Debug)]
pub enum DomainError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file extension '{extension}' for {}; expected .yaml, .yml or .json", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("invalid content in {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid schema structure: {0}")]
    SchemaStructure(String),

    #[error("schema namespace '{namespace}' is missing required principal entity types: {}", missing.join(", "))]
    MissingPrincipalTypes {
        namespace: String,
        missing: Vec<String>,
    },

    #[error("schema JSON size {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: usize, limit: usize },

    #[error("invalid namespace '{namespace}': must match {pattern}")]
    InvalidNamespace { namespace: String, pattern: String },

    #[error("actions not aligned to canonical action groups [{}]: {}", catalog.join(", "), violations.join(", "))]
    ActionGroupViolation {
        violations: Vec<String>,
        catalog: Vec<String>,
    },

    #[error("policy directory {}: {message}", path.display())]
    PolicyDirectory { path: PathBuf, message: String },

    #[error("policy syntax issues: {}", issues.join("; "))]
    PolicySyntax { issues: Vec<String> },

    #[error(transparent)]
    PolicyStore(#[from] PolicyStoreError),

    #[error("{0}")]
    CanaryFailures(CanaryReport),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DomainError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn parse(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn schema_structure(message: impl Into<String>) -> Self {
        Self::SchemaStructure(message.into())
    }

    pub fn policy_directory(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::PolicyDirectory {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for failures of the input artifacts rather than of the remote store.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. }
                | Self::Parse { .. }
                | Self::SchemaStructure(_)
                | Self::MissingPrincipalTypes { .. }
                | Self::SizeLimitExceeded { .. }
                | Self::InvalidNamespace { .. }
                | Self::ActionGroupViolation { .. }
                | Self::PolicySyntax { .. }
        )
    }
}
