//! Schema synchronization: replace the deployed schema only on a real difference.

use verified_permissions_sdk::{PolicyStoreError, SchemaClient};

use super::canonical::normalize_json;

/// Result of [`put_schema_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaSyncOutcome {
    /// Deployed and desired schemas are canonically equal; nothing was written.
    Unchanged,
    /// The desired schema replaced the deployed one.
    Applied,
}

impl SchemaSyncOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Converges the store's schema to `desired_cedar_json`.
///
/// A store without a schema is treated as holding the empty string.
///
/// # Errors
///
/// Any failure of reading or writing the schema, returned unmodified.
#[tracing::instrument(skip_all, fields(policy_store_id = %policy_store_id))]
pub async fn put_schema_if_changed<C>(
    client: &C,
    policy_store_id: &str,
    desired_cedar_json: &str,
) -> Result<SchemaSyncOutcome, PolicyStoreError>
where
    C: SchemaClient + ?Sized,
{
    let current = client.get_schema(policy_store_id).await?.unwrap_or_default();

    if normalize_json(&current) == normalize_json(desired_cedar_json) {
        tracing::info!("schema unchanged");
        return Ok(SchemaSyncOutcome::Unchanged);
    }

    client.put_schema(policy_store_id, desired_cedar_json).await?;
    tracing::info!(bytes = desired_cedar_json.len(), "schema applied");
    Ok(SchemaSyncOutcome::Applied)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FakeSchemas {
        current: Mutex<Option<String>>,
        get_error: Option<PolicyStoreError>,
        put_error: Option<PolicyStoreError>,
        puts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SchemaClient for FakeSchemas {
        async fn get_schema(&self, _: &str) -> Result<Option<String>, PolicyStoreError> {
            if let Some(err) = &self.get_error {
                return Err(err.clone());
            }
            Ok(self.current.lock().clone())
        }

        async fn put_schema(&self, _: &str, cedar_json: &str) -> Result<(), PolicyStoreError> {
            if let Some(err) = &self.put_error {
                return Err(err.clone());
            }
            self.puts.lock().push(cedar_json.to_owned());
            *self.current.lock() = Some(cedar_json.to_owned());
            Ok(())
        }
    }

    #[tokio::test]
    async fn absent_schema_is_applied() {
        let fake = FakeSchemas::default();
        let outcome = put_schema_if_changed(&fake, "ps-1", r#"{"acme":{}}"#).await.unwrap();
        assert_eq!(outcome, SchemaSyncOutcome::Applied);
        assert_eq!(fake.puts.lock().len(), 1);
    }

    #[tokio::test]
    async fn formatting_only_difference_is_a_no_op() {
        let fake = FakeSchemas {
            current: Mutex::new(Some("{ \"b\": 1,\n  \"a\": 2 }".to_owned())),
            ..FakeSchemas::default()
        };
        let outcome = put_schema_if_changed(&fake, "ps-1", r#"{"a":2,"b":1}"#).await.unwrap();
        assert_eq!(outcome, SchemaSyncOutcome::Unchanged);
        assert!(fake.puts.lock().is_empty());
    }

    #[tokio::test]
    async fn second_run_is_idempotent() {
        let fake = FakeSchemas::default();
        let desired = r#"{"acme":{"entityTypes":{}}}"#;
        assert!(put_schema_if_changed(&fake, "ps-1", desired).await.unwrap().is_applied());
        assert!(!put_schema_if_changed(&fake, "ps-1", desired).await.unwrap().is_applied());
    }

    #[tokio::test]
    async fn read_failure_propagates_without_write() {
        let fake = FakeSchemas {
            get_error: Some(PolicyStoreError::transport("GetSchema", "timeout")),
            ..FakeSchemas::default()
        };
        let err = put_schema_if_changed(&fake, "ps-1", "{}").await.unwrap_err();
        assert_eq!(err, PolicyStoreError::transport("GetSchema", "timeout"));
        assert!(fake.puts.lock().is_empty());
    }

    #[tokio::test]
    async fn write_failure_propagates_unmodified() {
        let put_error = PolicyStoreError::service("PutSchema", "ValidationException", "bad");
        let fake = FakeSchemas {
            put_error: Some(put_error.clone()),
            ..FakeSchemas::default()
        };
        let err = put_schema_if_changed(&fake, "ps-1", "{}").await.unwrap_err();
        assert_eq!(err, put_error);
    }
}
