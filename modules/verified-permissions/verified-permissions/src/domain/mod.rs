//! Domain layer for the Verified Permissions module.

pub mod action_groups;
pub mod canaries;
pub mod canonical;
pub mod error;
pub mod policies;
pub mod region;
pub mod schema;
pub mod service;
pub mod sync;

pub use action_groups::{ActionGroupCatalog, ActionGroupGovernor, ActionGroupMode};
pub use canaries::{CanaryCase, CanaryReport, CanaryRunner};
pub use error::DomainError;
pub use policies::{InstallReport, PolicyDocument};
pub use schema::LoadedSchema;
pub use service::{ConvergeReport, Converger, ValidationReport, validate_offline};
pub use sync::SchemaSyncOutcome;
