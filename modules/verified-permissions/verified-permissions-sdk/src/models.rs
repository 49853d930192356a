//! Models exchanged with the remote policy store.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Reference to a Cedar entity, e.g. `acme::Tenant::"t1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::\"{}\"", self.entity_type, self.entity_id)
    }
}

/// Reference to a Cedar action, e.g. `acme::Action::"GetTenant"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRef {
    pub action_type: String,
    pub action_id: String,
}

impl ActionRef {
    pub fn new(action_type: impl Into<String>, action_id: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            action_id: action_id.into(),
        }
    }
}

impl fmt::Display for ActionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::\"{}\"", self.action_type, self.action_id)
    }
}

/// Authorization decision.
///
/// Parsed case-insensitively; rendered as `ALLOW` / `DENY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("allow") {
            Ok(Self::Allow)
        } else if s.eq_ignore_ascii_case("deny") {
            Ok(Self::Deny)
        } else {
            Err(format!("unknown decision '{s}', expected ALLOW or DENY"))
        }
    }
}

impl Serialize for Decision {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One authorization decision request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub principal: EntityRef,
    pub action: ActionRef,
    pub resource: EntityRef,
    /// Attribute context; empty means no context is sent.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, Value>,
}

impl AuthorizationRequest {
    #[must_use]
    pub fn new(principal: EntityRef, action: ActionRef, resource: EntityRef) -> Self {
        Self {
            principal,
            action,
            resource,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: BTreeMap<String, Value>) -> Self {
        self.context = context;
        self
    }
}

/// Outcome of an authorization decision request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResponse {
    /// Decision as reported by the engine, verbatim.
    pub decision: String,
    /// Ids of the policies that determined the decision.
    #[serde(default)]
    pub determining_policies: Vec<String>,
    /// Evaluation errors reported by the engine.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl AuthorizationResponse {
    pub fn new(decision: impl Into<String>) -> Self {
        Self {
            decision: decision.into(),
            ..Self::default()
        }
    }

    /// Parsed decision; `None` when the engine reported something unrecognized.
    #[must_use]
    pub fn parsed_decision(&self) -> Option<Decision> {
        self.decision.parse().ok()
    }
}

/// A policy currently installed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub policy_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A static Cedar policy to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStaticPolicy {
    pub statement: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_parses_case_insensitively() {
        assert_eq!("ALLOW".parse::<Decision>(), Ok(Decision::Allow));
        assert_eq!("allow".parse::<Decision>(), Ok(Decision::Allow));
        assert_eq!(" Deny ".parse::<Decision>(), Ok(Decision::Deny));
        assert!("maybe".parse::<Decision>().is_err());
        assert_eq!(Decision::Deny.to_string(), "DENY");
    }

    #[test]
    fn decision_deserializes_from_yaml() {
        #[derive(Deserialize)]
        struct Case {
            expect: Decision,
        }
        let case: Case = serde_saphyr::from_str("expect: allow\n").unwrap();
        assert_eq!(case.expect, Decision::Allow);
    }

    #[test]
    fn entity_ref_uses_camel_case() {
        let entity: EntityRef =
            serde_json::from_value(json!({"entityType": "acme::Tenant", "entityId": "t1"}))
                .unwrap();
        assert_eq!(entity, EntityRef::new("acme::Tenant", "t1"));
        assert_eq!(entity.to_string(), "acme::Tenant::\"t1\"");
    }

    #[test]
    fn response_decision_parsing() {
        assert_eq!(
            AuthorizationResponse::new("DENY").parsed_decision(),
            Some(Decision::Deny)
        );
        assert_eq!(AuthorizationResponse::new("").parsed_decision(), None);
    }
}
