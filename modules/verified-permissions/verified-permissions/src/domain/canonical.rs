//! Canonical JSON: object keys sorted recursively, no insignificant whitespace.
//!
//! The canonical form is a pure function of semantic content, so two
//! documents that differ only in key order or formatting compare equal.

use serde_json::{Map, Value};

/// Rebuilds `value` with every object's keys in ascending order.
#[must_use]
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let sorted: Map<String, Value> = entries
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Minified JSON text of `value` with sorted keys.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    // Display of a Value cannot fail; it renders minified JSON.
    sort_keys(value).to_string()
}

/// Canonical form of a JSON text.
///
/// Empty input stays empty. Text that is not valid JSON is returned as-is so
/// that it never compares equal to a valid document.
#[must_use]
pub fn normalize_json(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    serde_json::from_str::<Value>(text).map_or_else(|_| text.to_owned(), |v| canonicalize(&v))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_and_whitespace_do_not_matter() {
        let a = r#"{"b": 1, "a": {"y": [1, 2], "x": null}}"#;
        let b = r#"{"a":{"x":null,"y":[1,2]},"b":1}"#;
        assert_eq!(normalize_json(a), normalize_json(b));
        assert_eq!(normalize_json(a), r#"{"a":{"x":null,"y":[1,2]},"b":1}"#);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let once = canonicalize(&json!({"z": {"b": true, "a": "s"}, "m": [{"d": 1, "c": 2}]}));
        assert_eq!(normalize_json(&once), once);
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(normalize_json("[1,2]"), normalize_json("[2,1]"));
    }

    #[test]
    fn empty_and_invalid_inputs() {
        assert_eq!(normalize_json(""), "");
        assert_eq!(normalize_json("not json"), "not json");
    }
}
