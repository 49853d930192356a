//! Verified Permissions SDK
//!
//! Public surface of the `verified_permissions` module:
//!
//! - [`SchemaClient`], [`PolicyClient`], [`AuthorizationClient`] - narrow capability
//!   traits over a remote Cedar policy store
//! - [`PolicyStoreClient`] - all three, for adapters that implement the full surface
//! - [`EntityRef`], [`ActionRef`], [`AuthorizationRequest`], [`AuthorizationResponse`],
//!   [`Decision`] - authorization decision models
//! - [`PolicySummary`], [`NewStaticPolicy`] - policy models
//! - [`PolicyStoreError`] - transport and service errors
//!
//! ## Usage
//!
//! ```ignore
//! use verified_permissions_sdk::{AuthorizationClient, AuthorizationRequest, EntityRef, ActionRef};
//!
//! let request = AuthorizationRequest::new(
//!     EntityRef::new("acme::Tenant", "t1"),
//!     ActionRef::new("acme::Action", "GetTenant"),
//!     EntityRef::new("acme::Tenant", "t1"),
//! );
//! let response = client.is_authorized(policy_store_id, &request).await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod models;

pub use api::{AuthorizationClient, PolicyClient, PolicyStoreClient, SchemaClient};
pub use error::PolicyStoreError;
pub use models::{
    ActionRef, AuthorizationRequest, AuthorizationResponse, Decision, EntityRef, NewStaticPolicy,
    PolicySummary,
};
