//! Capability traits over the remote policy store.
//!
//! Each trait declares only the calls a consumer actually needs, so fakes in
//! tests stay small and adapters can be swapped independently.

use async_trait::async_trait;

use crate::error::PolicyStoreError;
use crate::models::{AuthorizationRequest, AuthorizationResponse, NewStaticPolicy, PolicySummary};

/// Read and replace the store's Cedar schema.
#[async_trait]
pub trait SchemaClient: Send + Sync {
    /// Currently deployed schema as Cedar JSON, `None` when the store has none.
    ///
    /// # Errors
    ///
    /// Any [`PolicyStoreError`] other than "no schema" is returned as-is.
    async fn get_schema(&self, policy_store_id: &str) -> Result<Option<String>, PolicyStoreError>;

    /// Replace the store's schema with `cedar_json`.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyStoreError`] reported by the store.
    async fn put_schema(&self, policy_store_id: &str, cedar_json: &str)
    -> Result<(), PolicyStoreError>;
}

/// Manage static policies.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// All policies in the store, across pages.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyStoreError`] reported by the store.
    async fn list_policies(
        &self,
        policy_store_id: &str,
    ) -> Result<Vec<PolicySummary>, PolicyStoreError>;

    /// Create a static policy and return its id.
    ///
    /// # Errors
    ///
    /// Returns the [`PolicyStoreError`] reported by the store.
    async fn create_policy(
        &self,
        policy_store_id: &str,
        policy: NewStaticPolicy,
    ) -> Result<String, PolicyStoreError>;

    /// # Errors
    ///
    /// Returns the [`PolicyStoreError`] reported by the store.
    async fn delete_policy(
        &self,
        policy_store_id: &str,
        policy_id: &str,
    ) -> Result<(), PolicyStoreError>;
}

/// Ask the store for an authorization decision.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// # Errors
    ///
    /// Returns the [`PolicyStoreError`] reported by the store. A DENY
    /// decision is a successful response.
    async fn is_authorized(
        &self,
        policy_store_id: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse, PolicyStoreError>;
}

/// Full policy store surface used by the convergence pipeline.
pub trait PolicyStoreClient: SchemaClient + PolicyClient + AuthorizationClient {}

impl<T> PolicyStoreClient for T where T: SchemaClient + PolicyClient + AuthorizationClient {}
