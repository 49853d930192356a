//! Error types and classification for identity store writes.

use thiserror::Error;

/// Service error codes treated as uniqueness or concurrency conflicts.
const CONFLICT_CODES: &[&str] = &["ConditionalCheckFailedException"];

/// Service error codes the caller may retry with backoff.
const RETRYABLE_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TransactionInProgressException",
];

const TRANSACTION_CANCELED: &str = "TransactionCanceledException";

/// Cancellation reasons that mean a precondition or a concurrent transaction
/// rejected the batch.
const CONFLICT_REASONS: &[&str] = &["ConditionalCheckFailed", "TransactionConflict"];

/// Cancellation reasons caused by throughput limits.
const THROTTLE_REASONS: &[&str] = &["ProvisionedThroughputExceeded", "ThrottlingError"];

/// Raw failure reported by a store transport, before classification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct StoreError {
    /// Service error code, when the service answered.
    pub code: Option<String>,
    pub message: String,
    /// Per-item cancellation reasons of a cancelled transaction, in batch order.
    pub cancellation_reasons: Vec<Option<String>>,
}

impl StoreError {
    pub fn new(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cancellation_reasons: Vec::new(),
        }
    }

    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(code.into()), message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    #[must_use]
    pub fn with_cancellation_reasons(mut self, reasons: Vec<Option<String>>) -> Self {
        self.cancellation_reasons = reasons;
        self
    }

    /// `code: message [reasons: ...]`, omitting the parts that are absent.
    fn render(&self) -> String {
        let head = match &self.code {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message.clone(),
        };
        if self.cancellation_reasons.is_empty() {
            return head;
        }
        let reasons: Vec<&str> = self
            .cancellation_reasons
            .iter()
            .map(|r| r.as_deref().unwrap_or("None"))
            .collect();
        format!("{head} [reasons: {}]", reasons.join(", "))
    }
}


/// Classified outcome of a failed conditional write.
#[derive(Debug, Error)]
pub enum TxError {
    /// The caller built an invalid transaction; nothing was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A "not exists"/"exists" precondition failed or a concurrent
    /// transaction touched the same rows. Re-read state before retrying.
    #[error("conflict: {0}")]
    Conflict(#[source] StoreError),

    /// Throttled or blocked by an in-flight transaction; retry with backoff.
    #[error("retryable: {0}")]
    Retryable(#[source] StoreError),

    /// Any other failure.
    #[error("op error: {0}")]
    Op(#[source] StoreError),
}

impl TxError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Maps a raw store failure onto the conflict / retryable / op categories.
#[must_use]
pub fn classify(err: StoreError) -> TxError {
    let Some(code) = err.code.as_deref() else {
        return TxError::Op(err);
    };

    if code == TRANSACTION_CANCELED {
        return classify_cancellation(err);
    }
    if CONFLICT_CODES.contains(&code) {
        return TxError::Conflict(err);
    }
    if RETRYABLE_CODES.contains(&code) {
        return TxError::Retryable(err);
    }
    TxError::Op(err)
}

fn classify_cancellation(err: StoreError) -> TxError {
    let reasons: Vec<&str> = err
        .cancellation_reasons
        .iter()
        .filter_map(Option::as_deref)
        .filter(|r| *r != "None")
        .collect();

    let conflicting = reasons.iter().any(|r| CONFLICT_REASONS.contains(r));
    let throttled_only = !reasons.is_empty() && reasons.iter().all(|r| THROTTLE_REASONS.contains(r));

    if !conflicting && throttled_only {
        TxError::Retryable(err)
    } else {
        TxError::Conflict(err)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        assert_eq!(StoreError::transport("connection reset").to_string(), "connection reset");
        let err = StoreError::service("TransactionCanceledException", "cancelled")
            .with_cancellation_reasons(vec![None, Some("ConditionalCheckFailed".to_owned())]);
        assert_eq!(
            err.to_string(),
            "TransactionCanceledException: cancelled [reasons: None, ConditionalCheckFailed]"
        );
    }

    #[test]
    fn conditional_check_failure_is_conflict() {
        let err = classify(StoreError::service("ConditionalCheckFailedException", "x"));
        assert!(err.is_conflict());
    }

    #[test]
    fn cancelled_transaction_is_conflict() {
        let err = classify(
            StoreError::service(TRANSACTION_CANCELED, "cancelled").with_cancellation_reasons(
                vec![Some("None".to_owned()), Some("ConditionalCheckFailed".to_owned())],
            ),
        );
        assert!(err.is_conflict());

        let err = classify(StoreError::service(TRANSACTION_CANCELED, "cancelled"));
        assert!(err.is_conflict());
    }

    #[test]
    fn throttled_cancellation_is_retryable() {
        let err = classify(
            StoreError::service(TRANSACTION_CANCELED, "cancelled").with_cancellation_reasons(
                vec![None, Some("ThrottlingError".to_owned())],
            ),
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn throttling_codes_are_retryable() {
        for code in RETRYABLE_CODES {
            assert!(classify(StoreError::service(*code, "slow down")).is_retryable());
        }
    }

    #[test]
    fn other_failures_are_op_errors() {
        assert!(matches!(
            classify(StoreError::service("ValidationException", "bad")),
            TxError::Op(_)
        ));
        assert!(matches!(
            classify(StoreError::transport("connection reset")),
            TxError::Op(_)
        ));
    }

    #[test]
    fn display_includes_code_and_reasons() {
        let err = StoreError::service(TRANSACTION_CANCELED, "cancelled")
            .with_cancellation_reasons(vec![None, Some("ConditionalCheckFailed".to_owned())]);
        assert_eq!(
            err.to_string(),
            "TransactionCanceledException: cancelled [reasons: None, ConditionalCheckFailed]"
        );
    }
}
