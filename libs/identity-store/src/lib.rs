//! Identity store
//!
//! Single-table persistence for tenants, users, roles, tenant grants and
//! policy metadata:
//!
//! - [`keys`] - pure key encoding for rows and secondary indexes
//! - [`Row`], [`EntityRow`], [`GuardRow`] - physical rows
//! - [`WriteTransaction`] - all-or-nothing conditional multi-item writes
//! - [`TxError`] - conflict / retryable / op classification
//! - [`ops`] - create, update and delete operations per entity
//! - [`InMemoryIdentityStore`], [`DynamoIdentityStore`] - store clients
//!
//! ## Usage
//!
//! ```ignore
//! use identity_store::{DynamoIdentityStore, ops};
//!
//! let store = DynamoIdentityStore::new(aws_sdk_dynamodb::Client::new(&sdk_config), "auth-table");
//! match ops::create_user(&store, &user).await {
//!     Err(e) if e.is_retryable() => { /* back off and retry */ }
//!     Err(e) if e.is_conflict() => { /* email, phone or username already taken */ }
//!     other => other?,
//! }
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod client;
pub mod dynamo;
pub mod error;
pub mod keys;
pub mod memory;
pub mod ops;
pub mod row;
pub mod tx;

pub use client::{Condition, IdentityStoreClient, TransactItem};
pub use dynamo::DynamoIdentityStore;
pub use error::{StoreError, TxError, classify};
pub use keys::{IndexKey, PrimaryKey, SecondaryIndex};
pub use memory::InMemoryIdentityStore;
pub use row::{Attributes, EntityRow, GuardRow, GuardedAttribute, Row};
pub use tx::{TxCheck, WriteTransaction, write_transaction};
