//! Action-group governance: action names must start with a canonical group prefix.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use super::error::DomainError;

/// Canonical action-group prefixes.
pub const DEFAULT_ACTION_GROUPS: [&str; 16] = [
    "BatchCreate",
    "Create",
    "BatchDelete",
    "Delete",
    "Find",
    "Get",
    "BatchUpdate",
    "Update",
    "GlobalBatchCreate",
    "GlobalCreate",
    "GlobalBatchDelete",
    "GlobalDelete",
    "GlobalFind",
    "GlobalGet",
    "GlobalBatchUpdate",
    "GlobalUpdate",
];

/// Enforcement level for action-group alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionGroupMode {
    Off,
    Warn,
    #[default]
    Error,
}

impl ActionGroupMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_off(self) -> bool {
        matches!(self, Self::Off)
    }
}

impl fmt::Display for ActionGroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionGroupMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(DomainError::invalid_config(format!(
                "action group enforcement must be off, warn or error; got '{other}'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ActionGroupMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Immutable set of canonical action-group prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionGroupCatalog {
    prefixes: Vec<String>,
}

impl ActionGroupCatalog {
    /// # Errors
    ///
    /// `InvalidConfig` for an empty catalog or an empty prefix.
    pub fn new<I, S>(prefixes: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        if prefixes.is_empty() {
            return Err(DomainError::invalid_config("action group catalog is empty"));
        }
        if prefixes.iter().any(String::is_empty) {
            return Err(DomainError::invalid_config(
                "action group catalog contains an empty prefix",
            ));
        }
        Ok(Self { prefixes })
    }

    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Exact, case-sensitive prefix match against any group.
    #[must_use]
    pub fn is_compliant(&self, action: &str) -> bool {
        self.prefixes.iter().any(|p| action.starts_with(p.as_str()))
    }
}

impl Default for ActionGroupCatalog {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_ACTION_GROUPS.iter().map(|p| (*p).to_owned()).collect(),
        }
    }
}

/// Checks action names against an injected catalog.
#[derive(Debug, Clone, Default)]
pub struct ActionGroupGovernor {
    catalog: ActionGroupCatalog,
}

impl ActionGroupGovernor {
    #[must_use]
    pub const fn new(catalog: ActionGroupCatalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub const fn catalog(&self) -> &ActionGroupCatalog {
        &self.catalog
    }

    /// Non-compliant action names, in input order.
    #[must_use]
    pub fn violations<S: AsRef<str>>(&self, actions: &[S]) -> Vec<String> {
        actions
            .iter()
            .map(AsRef::as_ref)
            .filter(|a| !self.catalog.is_compliant(a))
            .map(str::to_owned)
            .collect()
    }

    /// Applies `mode` to `actions` and returns the violators.
    ///
    /// `Off` never reports anything; `Warn` logs and returns the violators.
    ///
    /// # Errors
    ///
    /// `ActionGroupViolation` under `Error` when any action is non-compliant.
    pub fn enforce<S: AsRef<str>>(
        &self,
        actions: &[S],
        mode: ActionGroupMode,
    ) -> Result<Vec<String>, DomainError> {
        if mode.is_off() {
            return Ok(Vec::new());
        }
        let violations = self.violations(actions);
        if violations.is_empty() {
            return Ok(violations);
        }
        match mode {
            ActionGroupMode::Error => Err(DomainError::ActionGroupViolation {
                violations,
                catalog: self.catalog.prefixes.clone(),
            }),
            ActionGroupMode::Warn | ActionGroupMode::Off => {
                tracing::warn!(
                    violations = ?violations,
                    "actions not aligned to canonical action groups"
                );
                Ok(violations)
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn warn_mode_returns_violators_without_failing() {
        let governor = ActionGroupGovernor::default();
        let bad = governor
            .enforce(&["GetTenant", "FooBar"], ActionGroupMode::Warn)
            .unwrap();
        assert_eq!(bad, vec!["FooBar"]);
        assert!(logs_contain("not aligned"));
    }

    #[test]
    fn error_mode_fails_with_all_violators_and_catalog() {
        let governor = ActionGroupGovernor::default();
        let err = governor
            .enforce(&["GetTenant", "FooBar", "listUsers"], ActionGroupMode::Error)
            .unwrap_err();
        let DomainError::ActionGroupViolation { violations, catalog } = err else {
            panic!("expected an action group violation");
        };
        assert_eq!(violations, vec!["FooBar", "listUsers"]);
        assert_eq!(catalog.len(), DEFAULT_ACTION_GROUPS.len());
    }

    #[test]
    fn off_mode_is_a_no_op() {
        let governor = ActionGroupGovernor::default();
        assert!(governor.enforce(&["FooBar"], ActionGroupMode::Off).unwrap().is_empty());
    }

    #[test]
    fn prefix_match_is_exact_and_case_sensitive() {
        let catalog = ActionGroupCatalog::default();
        assert!(catalog.is_compliant("Getfoo"));
        assert!(catalog.is_compliant("GetX"));
        assert!(catalog.is_compliant("GlobalBatchUpdateRoles"));
        assert!(!catalog.is_compliant("getTenant"));
        assert!(!catalog.is_compliant("ListTenants"));
    }

    #[test]
    fn injected_catalog_replaces_defaults() {
        let governor = ActionGroupGovernor::new(ActionGroupCatalog::new(["List"]).unwrap());
        assert_eq!(governor.violations(&["ListTenants", "GetTenant"]), vec!["GetTenant"]);
        assert!(ActionGroupCatalog::new(Vec::<String>::new()).is_err());
        assert!(ActionGroupCatalog::new([""]).is_err());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("WARN".parse::<ActionGroupMode>().unwrap(), ActionGroupMode::Warn);
        assert_eq!(" off ".parse::<ActionGroupMode>().unwrap(), ActionGroupMode::Off);
        assert!("strict".parse::<ActionGroupMode>().is_err());
        assert_eq!(ActionGroupMode::default(), ActionGroupMode::Error);
    }
}
