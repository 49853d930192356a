//! Adapters to external services.

pub mod aws;

pub use aws::{AwsPolicyStoreClient, load_sdk_config};
