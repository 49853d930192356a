//! In-process identity store with the same all-or-nothing semantics as the
//! remote multi-item transaction. Used by tests and local tooling.

use std::collections::{BTreeMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::{Condition, IdentityStoreClient, TransactItem};
use crate::error::StoreError;
use crate::keys::PrimaryKey;
use crate::row::Attributes;

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailed";

#[derive(Debug, Default)]
struct State {
    rows: BTreeMap<PrimaryKey, Attributes>,
    injected: VecDeque<StoreError>,
    calls: usize,
}

/// Identity store backed by an ordered in-memory map.
#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    state: Mutex<State>,
}

impl InMemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &PrimaryKey) -> Option<Attributes> {
        self.state.lock().rows.get(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.state.lock().rows.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().rows.is_empty()
    }

    /// Keys currently stored, in key order.
    #[must_use]
    pub fn keys(&self) -> Vec<PrimaryKey> {
        self.state.lock().rows.keys().cloned().collect()
    }

    /// Number of `transact_write` calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    /// Fail the next `transact_write` call with `err` without touching rows.
    pub fn inject_failure(&self, err: StoreError) {
        self.state.lock().injected.push_back(err);
    }
}

fn holds(condition: Condition, present: bool) -> bool {
    match condition {
        Condition::NotExists => !present,
        Condition::Exists => present,
    }
}

#[async_trait]
impl IdentityStoreClient for InMemoryIdentityStore {
    async fn transact_write(&self, items: Vec<TransactItem>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.calls += 1;

        if let Some(err) = state.injected.pop_front() {
            return Err(err);
        }

        let mut seen = HashSet::with_capacity(items.len());
        if !items.iter().all(|item| seen.insert(item.key().clone())) {
            return Err(StoreError::service(
                "ValidationException",
                "Transaction request cannot include multiple operations on one item",
            ));
        }

        let reasons: Vec<Option<String>> = items
            .iter()
            .map(|item| {
                let present = state.rows.contains_key(item.key());
                match item.condition() {
                    Some(condition) if !holds(condition, present) => {
                        Some(CONDITIONAL_CHECK_FAILED.to_owned())
                    }
                    _ => None,
                }
            })
            .collect();

        if reasons.iter().any(Option::is_some) {
            return Err(StoreError::service(
                "TransactionCanceledException",
                "Transaction cancelled, please refer cancellation reasons for specific reasons",
            )
            .with_cancellation_reasons(reasons));
        }

        for item in items {
            match item {
                TransactItem::Put { key, item, .. } => {
                    state.rows.insert(key, item);
                }
                TransactItem::Delete { key, .. } => {
                    state.rows.remove(&key);
                }
                TransactItem::ConditionCheck { .. } => {}
            }
        }
        Ok(())
    }
}
