//! Error types for policy store calls.

use thiserror::Error;

/// Failure of a call to the remote policy store.
///
/// A decision of DENY is not an error; it is reported through
/// [`crate::AuthorizationResponse`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyStoreError {
    /// The addressed store, schema or policy does not exist.
    #[error("{operation}: not found: {message}")]
    NotFound {
        operation: &'static str,
        message: String,
    },

    /// The service rejected the call because of request rate limits.
    #[error("{operation}: throttled ({code}): {message}")]
    Throttled {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// The service answered with an error code.
    #[error("{operation}: {code}: {message}")]
    Service {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// No usable answer: connection, timeout, credentials or request construction.
    #[error("{operation}: transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
}

impl PolicyStoreError {
    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            operation,
            message: message.into(),
        }
    }

    pub fn throttled(
        operation: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Throttled {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn service(
        operation: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Name of the remote operation that failed, e.g. `GetSchema`.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::NotFound { operation, .. }
            | Self::Throttled { operation, .. }
            | Self::Service { operation, .. }
            | Self::Transport { operation, .. } => operation,
        }
    }

    /// Service error code, when the service answered with one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Throttled { code, .. } | Self::Service { code, .. } => Some(code),
            Self::NotFound { .. } | Self::Transport { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }
}
