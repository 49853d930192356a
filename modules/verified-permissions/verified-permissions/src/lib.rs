//! Verified Permissions Module
//!
//! Converges an Amazon Verified Permissions policy store to a declared state:
//! validates a Cedar schema document, keeps action names inside the canonical
//! action groups, syncs the schema only when it changed, installs guardrail and
//! caller policies, and proves the result with canary authorization checks.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod domain;
pub mod infra;

pub use config::VerifiedPermissionsConfig;
pub use domain::{Converger, DomainError};
pub use infra::{AwsPolicyStoreClient, load_sdk_config};
