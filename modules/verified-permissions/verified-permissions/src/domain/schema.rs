//! Schema loading and structural validation.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::canonical::canonicalize;
use super::error::DomainError;

/// Maximum size of the canonical schema accepted by the policy store.
pub const SCHEMA_SIZE_LIMIT: usize = 100_000;

/// Canonical size at which a warning is emitted (95% of the limit).
pub const SCHEMA_SIZE_WARN_THRESHOLD: usize = 95_000;

/// Principal entity types every schema namespace must declare.
pub const REQUIRED_PRINCIPAL_TYPES: [&str; 5] = ["Tenant", "User", "Role", "GlobalRole", "TenantGrant"];

/// Naming convention for namespaces: lowercase alphanumeric, hyphen separated.
pub const NAMESPACE_PATTERN: &str = r"^[a-z0-9][a-z0-9-]+$";

#[allow(clippy::expect_used)]
static NAMESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(NAMESPACE_PATTERN).expect("namespace pattern is a valid literal"));

/// Source format of a schema or canary document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// # Errors
    ///
    /// `UnsupportedFormat` for anything but `.yaml`, `.yml` and `.json`.
    pub fn from_path(path: &Path) -> Result<Self, DomainError> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            _ => Err(DomainError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }
}

/// Validated schema ready to be sent to the policy store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSchema {
    /// Canonical Cedar JSON.
    pub cedar_json: String,
    pub namespace: String,
    /// Declared action names, sorted.
    pub actions: Vec<String>,
    /// Advisory findings that did not fail validation.
    pub warnings: Vec<String>,
}

/// Reads and parses a YAML or JSON document into a JSON value.
///
/// # Errors
///
/// - `Io` when the file cannot be read
/// - `UnsupportedFormat` for an unknown extension
/// - `Parse` for malformed content
pub fn read_document(path: &Path) -> Result<Value, DomainError> {
    let text = std::fs::read_to_string(path).map_err(|e| DomainError::io(path, e))?;
    let format = DocumentFormat::from_path(path)?;
    parse_document(path, &text, format)
}

/// # Errors
///
/// `Parse` for malformed content.
pub fn parse_document(path: &Path, text: &str, format: DocumentFormat) -> Result<Value, DomainError> {
    match format {
        DocumentFormat::Yaml => {
            serde_saphyr::from_str::<Value>(text).map_err(|e| DomainError::parse(path, e.to_string()))
        }
        DocumentFormat::Json => {
            serde_json::from_str::<Value>(text).map_err(|e| DomainError::parse(path, e.to_string()))
        }
    }
}

/// Loads a schema file and validates it.
///
/// # Errors
///
/// See [`read_document`] and [`validate_schema_document`].
pub fn load_and_validate_schema(path: &Path) -> Result<LoadedSchema, DomainError> {
    load_and_validate_schema_with(path, None)
}

/// Like [`load_and_validate_schema`], replacing the namespace key with
/// `namespace_override` when given.
///
/// # Errors
///
/// See [`read_document`] and [`validate_schema_document`].
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_and_validate_schema_with(
    path: &Path,
    namespace_override: Option<&str>,
) -> Result<LoadedSchema, DomainError> {
    let document = read_document(path)?;
    let schema = validate_schema_document(document, namespace_override)?;
    tracing::debug!(
        namespace = %schema.namespace,
        actions = schema.actions.len(),
        bytes = schema.cedar_json.len(),
        "schema loaded"
    );
    Ok(schema)
}

/// Validates a parsed schema document and renders its canonical form.
///
/// # Errors
///
/// - `SchemaStructure` unless the document maps exactly one namespace to a
///   mapping with an `entityTypes` mapping
/// - `InvalidNamespace` when `namespace_override` breaks the naming convention
/// - `MissingPrincipalTypes` naming every absent required principal
/// - `SizeLimitExceeded` when the canonical JSON is larger than [`SCHEMA_SIZE_LIMIT`]
pub fn validate_schema_document(
    document: Value,
    namespace_override: Option<&str>,
) -> Result<LoadedSchema, DomainError> {
    let Value::Object(top) = document else {
        return Err(DomainError::schema_structure(
            "schema must be a mapping of namespace to {entityTypes, actions}",
        ));
    };
    if top.len() != 1 {
        return Err(DomainError::schema_structure(format!(
            "a single namespace per schema is supported; found {}",
            top.len()
        )));
    }
    let Some((declared, body)) = top.into_iter().next() else {
        return Err(DomainError::schema_structure("schema has no namespace"));
    };

    let mut warnings = Vec::new();
    let namespace = match namespace_override {
        Some(ns) => {
            if !NAMESPACE_RE.is_match(ns) {
                return Err(DomainError::InvalidNamespace {
                    namespace: ns.to_owned(),
                    pattern: NAMESPACE_PATTERN.to_owned(),
                });
            }
            ns.to_owned()
        }
        None => {
            if !NAMESPACE_RE.is_match(&declared) {
                warnings.push(format!(
                    "namespace '{declared}' is non-standard; consider simple kebab-case"
                ));
            }
            declared
        }
    };

    let Value::Object(body) = body else {
        return Err(DomainError::schema_structure(format!(
            "schema namespace '{namespace}' must map to an object"
        )));
    };
    require_principals(&namespace, &body)?;
    let actions = action_names(&namespace, &body)?;

    let mut document = Map::new();
    document.insert(namespace.clone(), Value::Object(body));
    let cedar_json = canonicalize(&Value::Object(document));

    let size = cedar_json.len();
    if size > SCHEMA_SIZE_LIMIT {
        return Err(DomainError::SizeLimitExceeded {
            size,
            limit: SCHEMA_SIZE_LIMIT,
        });
    }
    if size >= SCHEMA_SIZE_WARN_THRESHOLD {
        warnings.push(format!(
            "schema JSON is {size} bytes (>=95% of the {SCHEMA_SIZE_LIMIT} byte limit); consider simplifying entity shapes"
        ));
    }

    Ok(LoadedSchema {
        cedar_json,
        namespace,
        actions,
        warnings,
    })
}

fn require_principals(namespace: &str, body: &Map<String, Value>) -> Result<(), DomainError> {
    let entity_types = match body.get("entityTypes") {
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(DomainError::schema_structure(
                "entityTypes must be an object of entity type definitions",
            ));
        }
        None => {
            return Err(DomainError::schema_structure(format!(
                "schema namespace '{namespace}' must define entityTypes"
            )));
        }
    };

    let missing: Vec<String> = REQUIRED_PRINCIPAL_TYPES
        .iter()
        .filter(|kind| !entity_types.contains_key(**kind))
        .map(|kind| (*kind).to_owned())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DomainError::MissingPrincipalTypes {
            namespace: namespace.to_owned(),
            missing,
        })
    }
}

fn action_names(namespace: &str, body: &Map<String, Value>) -> Result<Vec<String>, DomainError> {
    match body.get("actions") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(actions)) => {
            let mut names: Vec<String> = actions.keys().cloned().collect();
            names.sort();
            Ok(names)
        }
        Some(_) => Err(DomainError::schema_structure(format!(
            "actions of schema namespace '{namespace}' must be a mapping"
        ))),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn entity_types() -> Value {
        json!({
            "Tenant": {}, "User": {}, "Role": {}, "GlobalRole": {}, "TenantGrant": {}
        })
    }

    fn schema(namespace: &str) -> Value {
        json!({
            namespace: {
                "entityTypes": entity_types(),
                "actions": {"GetTenant": {}, "CreateUser": {}}
            }
        })
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn valid_document_yields_sorted_actions_and_canonical_json() {
        let loaded = validate_schema_document(schema("acme"), None).unwrap();
        assert_eq!(loaded.namespace, "acme");
        assert_eq!(loaded.actions, vec!["CreateUser", "GetTenant"]);
        assert!(loaded.warnings.is_empty());
        assert!(loaded.cedar_json.starts_with(r#"{"acme":{"actions":{"CreateUser":{}"#));
    }

    #[test]
    fn non_standard_namespace_is_a_warning() {
        let loaded = validate_schema_document(schema("Acme_App"), None).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("Acme_App"));
    }

    #[test]
    fn namespace_override_replaces_key_and_is_strict() {
        let loaded = validate_schema_document(schema("Whatever"), Some("acme-prod")).unwrap();
        assert_eq!(loaded.namespace, "acme-prod");
        assert!(loaded.cedar_json.starts_with(r#"{"acme-prod":"#));
        assert!(loaded.warnings.is_empty());

        let err = validate_schema_document(schema("acme"), Some("Bad_NS")).unwrap_err();
        assert!(matches!(err, DomainError::InvalidNamespace { .. }));
    }

    #[test]
    fn zero_or_many_namespaces_fail() {
        assert!(matches!(
            validate_schema_document(json!({}), None).unwrap_err(),
            DomainError::SchemaStructure(_)
        ));
        let mut two = schema("a1");
        two["b2"] = json!({"entityTypes": entity_types()});
        assert!(matches!(
            validate_schema_document(two, None).unwrap_err(),
            DomainError::SchemaStructure(_)
        ));
        assert!(matches!(
            validate_schema_document(json!(["acme"]), None).unwrap_err(),
            DomainError::SchemaStructure(_)
        ));
    }

    #[test]
    fn missing_role_is_named() {
        let doc = json!({"acme": {"entityTypes": {"Tenant": {}, "User": {}, "GlobalRole": {}, "TenantGrant": {}}}});
        let err = validate_schema_document(doc, None).unwrap_err();
        match &err {
            DomainError::MissingPrincipalTypes { missing, .. } => assert_eq!(missing, &["Role"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("Role"));
    }

    #[test]
    fn all_missing_principals_are_reported_together() {
        let err = validate_schema_document(json!({"acme": {"entityTypes": {}}}), None).unwrap_err();
        let DomainError::MissingPrincipalTypes { missing, .. } = err else {
            panic!("expected missing principals");
        };
        assert_eq!(missing.len(), REQUIRED_PRINCIPAL_TYPES.len());
    }

    #[test]
    fn absent_actions_yield_empty_set() {
        let doc = json!({"acme": {"entityTypes": entity_types()}});
        assert!(validate_schema_document(doc, None).unwrap().actions.is_empty());

        let doc = json!({"acme": {"entityTypes": entity_types(), "actions": null}});
        assert!(validate_schema_document(doc, None).unwrap().actions.is_empty());

        let doc = json!({"acme": {"entityTypes": entity_types(), "actions": ["GetTenant"]}});
        assert!(matches!(
            validate_schema_document(doc, None).unwrap_err(),
            DomainError::SchemaStructure(_)
        ));
    }

    #[test]
    fn size_limit_applies_to_canonical_form() {
        let mut doc = schema("acme");
        doc["acme"]["annotations"] = json!({"blob": "x".repeat(SCHEMA_SIZE_LIMIT)});
        let err = validate_schema_document(doc, None).unwrap_err();
        assert!(matches!(err, DomainError::SizeLimitExceeded { limit: SCHEMA_SIZE_LIMIT, .. }));
    }

    #[test]
    fn near_limit_emits_warning() {
        let mut doc = schema("acme");
        doc["acme"]["annotations"] = json!({"blob": "x".repeat(SCHEMA_SIZE_WARN_THRESHOLD)});
        let loaded = validate_schema_document(doc, None).unwrap();
        assert!(loaded.warnings.iter().any(|w| w.contains("95%")));
    }

    #[test]
    fn yaml_and_json_files_canonicalize_identically() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = write_file(
            &dir,
            "schema.yaml",
            "acme:\n  actions:\n    GetTenant: {}\n  entityTypes:\n    User: {}\n    Tenant: {}\n    Role: {}\n    GlobalRole: {}\n    TenantGrant: {}\n",
        );
        let json = write_file(
            &dir,
            "schema.json",
            r#"{"acme": {"entityTypes": {"Tenant": {}, "User": {}, "Role": {}, "GlobalRole": {}, "TenantGrant": {}}, "actions": {"GetTenant": {}}}}"#,
        );

        let from_yaml = load_and_validate_schema(&yaml).unwrap();
        let from_json = load_and_validate_schema(&json).unwrap();
        assert_eq!(from_yaml.cedar_json, from_json.cedar_json);
    }

    #[test]
    fn file_level_failures() {
        let dir = tempfile::tempdir().unwrap();
        let txt = write_file(&dir, "schema.txt", "{}");
        assert!(matches!(
            load_and_validate_schema(&txt).unwrap_err(),
            DomainError::UnsupportedFormat { .. }
        ));

        let bad = write_file(&dir, "schema.json", "{ not json");
        assert!(matches!(
            load_and_validate_schema(&bad).unwrap_err(),
            DomainError::Parse { .. }
        ));

        let missing = dir.path().join("absent.yaml");
        assert!(matches!(
            load_and_validate_schema(&missing).unwrap_err(),
            DomainError::Io { .. }
        ));
    }

    #[test]
    fn unreadable_file_is_io_before_format() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("schema.txt");
        assert!(matches!(
            load_and_validate_schema(&missing).unwrap_err(),
            DomainError::Io { .. }
        ));
    }
}
