//! Conditional write coordinator.
//!
//! Builds one all-or-nothing multi-item write:
//! - every put is guarded by "no row exists at (PK, SK)"
//! - replacements are guarded by "a row exists at (PK, SK)"
//! - checks are extra assertions bundled into the same unit
//! - deletes are guarded by "a row exists at (PK, SK)"
//!
//! Failures are classified into conflict / retryable / op errors. No retries
//! happen here; backoff is the caller's decision.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::client::{Condition, IdentityStoreClient, TransactItem};
use crate::error::{TxError, classify};
use crate::keys::PrimaryKey;
use crate::row::Row;

/// Extra conditional assertion within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCheck {
    pub key: PrimaryKey,
    pub condition: Condition,
}

impl TxCheck {
    #[must_use]
    pub const fn new(key: PrimaryKey, condition: Condition) -> Self {
        Self { key, condition }
    }

    /// Asserts that the referenced row exists.
    #[must_use]
    pub const fn exists(key: PrimaryKey) -> Self {
        Self::new(key, Condition::Exists)
    }

    /// Asserts that nothing is stored at the key.
    #[must_use]
    pub const fn not_exists(key: PrimaryKey) -> Self {
        Self::new(key, Condition::NotExists)
    }
}

/// Builder for one atomic multi-item write.
#[derive(Debug, Clone, Default)]
pub struct WriteTransaction {
    puts: Vec<Row>,
    replacements: Vec<Row>,
    checks: Vec<TxCheck>,
    deletes: Vec<PrimaryKey>,
}

impl WriteTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row that must not exist yet.
    #[must_use]
    pub fn put(mut self, row: impl Into<Row>) -> Self {
        self.puts.push(row.into());
        self
    }

    /// Overwrite a row that must already exist.
    #[must_use]
    pub fn replace(mut self, row: impl Into<Row>) -> Self {
        self.replacements.push(row.into());
        self
    }

    #[must_use]
    pub fn check(mut self, check: TxCheck) -> Self {
        self.checks.push(check);
        self
    }

    /// Remove a row that must exist.
    #[must_use]
    pub fn delete(mut self, key: PrimaryKey) -> Self {
        self.deletes.push(key);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty()
            && self.replacements.is_empty()
            && self.checks.is_empty()
            && self.deletes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.puts.len() + self.replacements.len() + self.checks.len() + self.deletes.len()
    }

    /// Transaction entries in execution order: puts, replacements, checks, deletes.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` when the transaction has no entries
    /// - `InvalidArgument` when a key is addressed more than once
    pub fn items(&self) -> Result<Vec<TransactItem>, TxError> {
        if self.is_empty() {
            return Err(TxError::invalid_argument(
                "write transaction requires at least one put or check",
            ));
        }

        let mut items = Vec::with_capacity(self.len());

        for (index, row) in self.puts.iter().enumerate() {
            let key = row.key();
            debug!(index, key = %key.preview(), guard = row.is_guard(), "identity_store.tx.put");
            items.push(TransactItem::Put {
                key,
                item: row.item(),
                condition: Condition::NotExists,
            });
        }
        for (index, row) in self.replacements.iter().enumerate() {
            let key = row.key();
            debug!(index, key = %key.preview(), guard = row.is_guard(), "identity_store.tx.replace");
            items.push(TransactItem::Put {
                key,
                item: row.item(),
                condition: Condition::Exists,
            });
        }
        for (index, check) in self.checks.iter().enumerate() {
            debug!(index, key = %check.key.preview(), condition = ?check.condition, "identity_store.tx.check");
            items.push(TransactItem::ConditionCheck {
                key: check.key.clone(),
                condition: check.condition,
            });
        }
        for (index, key) in self.deletes.iter().enumerate() {
            debug!(index, key = %key.preview(), "identity_store.tx.delete");
            items.push(TransactItem::Delete {
                key: key.clone(),
                condition: Some(Condition::Exists),
            });
        }

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if !seen.insert(item.key()) {
                return Err(TxError::invalid_argument(format!(
                    "key {} appears more than once in one transaction",
                    item.key().preview()
                )));
            }
        }

        Ok(items)
    }

    /// Execute the transaction with a single call to the store.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or self-overlapping transaction
    /// - `Conflict`, `Retryable` or `Op` as classified from the store failure
    pub async fn execute<C>(self, client: &C) -> Result<(), TxError>
    where
        C: IdentityStoreClient + ?Sized,
    {
        let items = self.items()?;
        client.transact_write(items).await.map_err(classify)?;
        info!(
            puts = self.puts.len(),
            replacements = self.replacements.len(),
            checks = self.checks.len(),
            deletes = self.deletes.len(),
            "identity_store.tx.ok"
        );
        Ok(())
    }
}

/// Insert `puts` (each guarded by "not exists") together with `checks` in one
/// atomic write.
///
/// # Errors
///
/// - `InvalidArgument` when both `puts` and `checks` are empty
/// - `Conflict`, `Retryable` or `Op` as classified from the store failure
pub async fn write_transaction<C>(
    client: &C,
    puts: Vec<Row>,
    checks: Vec<TxCheck>,
) -> Result<(), TxError>
where
    C: IdentityStoreClient + ?Sized,
{
    let tx = puts.into_iter().fold(WriteTransaction::new(), WriteTransaction::put);
    let tx = checks.into_iter().fold(tx, WriteTransaction::check);
    tx.execute(client).await
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::keys::{tenant_name_guard_key, tenant_primary_key, user_primary_key};
    use crate::row::{EntityRow, GuardRow, GuardedAttribute};
    use tracing_test::traced_test;

    fn tenant_row(id: &str) -> EntityRow {
        EntityRow::new(tenant_primary_key(id)).with_attribute("name", "Acme")
    }

    #[test]
    fn empty_transaction_is_rejected() {
        let err = WriteTransaction::new().items().unwrap_err();
        assert!(matches!(err, TxError::InvalidArgument(_)));
    }

    #[test]
    fn puts_are_guarded_by_not_exists() {
        let items = WriteTransaction::new()
            .put(tenant_row("t1"))
            .put(GuardRow::new(GuardedAttribute::TenantName, "Acme", "t1"))
            .items()
            .unwrap();

        assert_eq!(items.len(), 2);
        for item in &items {
            assert!(matches!(
                item,
                TransactItem::Put {
                    condition: Condition::NotExists,
                    ..
                }
            ));
        }
        assert_eq!(items[1].key(), &tenant_name_guard_key("Acme"));
    }

    #[test]
    fn entries_keep_kind_specific_conditions() {
        let items = WriteTransaction::new()
            .replace(tenant_row("t1"))
            .check(TxCheck::exists(user_primary_key("u1")))
            .delete(tenant_name_guard_key("Old"))
            .items()
            .unwrap();

        assert_eq!(items[0].condition(), Some(Condition::Exists));
        assert!(matches!(items[1], TransactItem::ConditionCheck { .. }));
        assert_eq!(items[2].condition(), Some(Condition::Exists));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = WriteTransaction::new()
            .put(tenant_row("t1"))
            .check(TxCheck::exists(tenant_primary_key("t1")))
            .items()
            .unwrap_err();
        assert!(matches!(err, TxError::InvalidArgument(_)));
    }

    #[test]
    #[traced_test]
    fn debug_logs_carry_key_previews_only() {
        WriteTransaction::new()
            .put(
                EntityRow::new(user_primary_key("user-123456"))
                    .with_attribute("secret", "do-not-log"),
            )
            .items()
            .unwrap();

        assert!(logs_contain("identity_store.tx.put"));
        assert!(logs_contain("USER#user..."));
        assert!(!logs_contain("do-not-log"));
    }
}
