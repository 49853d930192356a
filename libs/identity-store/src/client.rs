//! Narrow capability trait over the identity store transport.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::keys::PrimaryKey;
use crate::row::Attributes;

/// Row-level precondition of a transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// No row exists at the key.
    NotExists,
    /// A row exists at the key.
    Exists,
}

/// One entry of an all-or-nothing multi-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    Put {
        key: PrimaryKey,
        item: Attributes,
        condition: Condition,
    },
    ConditionCheck {
        key: PrimaryKey,
        condition: Condition,
    },
    Delete {
        key: PrimaryKey,
        condition: Option<Condition>,
    },
}

impl TransactItem {
    #[must_use]
    pub const fn key(&self) -> &PrimaryKey {
        match self {
            Self::Put { key, .. } | Self::ConditionCheck { key, .. } | Self::Delete { key, .. } => {
                key
            }
        }
    }

    #[must_use]
    pub const fn condition(&self) -> Option<Condition> {
        match self {
            Self::Put { condition, .. } | Self::ConditionCheck { condition, .. } => {
                Some(*condition)
            }
            Self::Delete { condition, .. } => *condition,
        }
    }
}

/// Multi-item conditional write primitive of the identity store.
///
/// Implementations must apply either every entry or none of them; a failed
/// condition anywhere cancels the whole batch.
#[async_trait]
pub trait IdentityStoreClient: Send + Sync {
    /// Execute the entries as one atomic transaction.
    ///
    /// # Errors
    ///
    /// Returns the raw [`StoreError`] reported by the transport; callers
    /// classify it with [`crate::classify`].
    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), StoreError>;
}
