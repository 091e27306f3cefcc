//! SDK error types with recovery context.
//!
//! Provides a two-tier error model:
//! - **Store errors**: availability, user rejection, chain failures, precondition conflicts
//! - **Registry errors**: decode failures, validation, index conflicts after retries
//!
//! Each error maps onto one [`ErrorCategory`], which decides how it is surfaced:
//! decode problems are recovered locally, everything on the write path ends up as a
//! human-readable message in the transaction lifecycle.

use committee_ledger_types::{CodecError, ValidationError};
use snafu::{Location, Snafu};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// Message shown when the account holder declines a transaction.
pub const USER_REJECTED_MESSAGE: &str = "Transaction rejected by user";

/// How an error is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// A record or index blob is present but unparseable. Recovered locally.
    Decode,
    /// The store reports itself unavailable.
    Availability,
    /// The account holder declined to sign.
    UserRejected,
    /// The identifier index kept changing underneath a join.
    RegistryConflict,
    /// Anything else.
    Unknown,
}

/// SDK error types with context-rich error messages.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SdkError {
    /// The ledger store reports itself unavailable.
    #[snafu(display("Ledger store is not available"))]
    Unavailable,

    /// The account holder declined to sign the transaction.
    #[snafu(display("User rejected transaction: {message}"))]
    UserRejected {
        /// Reason reported by the wallet.
        message: String,
    },

    /// The chain rejected or failed to confirm a write.
    #[snafu(display("Chain error: {message}"))]
    Chain {
        /// Error message from the chain.
        message: String,
    },

    /// A store round trip failed before reaching the ledger.
    #[snafu(display("Transport error at {location}: {message}"))]
    Transport {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// A conditional write found the key in a different state than expected.
    #[snafu(display(
        "Write precondition failed for '{key}': expected version {expected:?}, found {actual:?}"
    ))]
    Conflict {
        /// Key whose precondition failed.
        key: String,
        /// Version the writer expected (`None` = key absent).
        expected: Option<u64>,
        /// Version the store holds (`None` = key absent).
        actual: Option<u64>,
    },

    /// The identifier index kept changing concurrently until retries ran out.
    #[snafu(display(
        "Committee index changed concurrently {attempts} times; please retry joining"
    ))]
    RegistryConflict {
        /// Number of index update attempts made.
        attempts: u32,
    },

    /// A stored blob could not be encoded or decoded.
    #[snafu(display("Codec error for '{key}': {source}"))]
    Codec {
        /// Store key of the blob.
        key: String,
        /// Underlying codec error.
        source: CodecError,
    },

    /// The join request failed validation; nothing was written.
    #[snafu(display("Invalid join request: {source}"))]
    Validation {
        /// The violated constraint.
        source: ValidationError,
    },

    /// No account is connected.
    #[snafu(display("Please connect wallet first"))]
    NotConnected,

    /// The selection algorithm failed or returned an inconsistent outcome.
    #[snafu(display("Sortition error: {message}"))]
    Sortition {
        /// Error description.
        message: String,
    },

    /// Retry attempts exhausted on transient failures.
    #[snafu(display("Retry exhausted after {attempts} attempts: {last_error}"))]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message before giving up.
        last_error: String,
    },

    /// Operation timed out.
    #[snafu(display("Operation timed out after {duration_ms}ms"))]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The operation was cancelled because its session was disconnected or shut down.
    #[snafu(display("Operation cancelled"))]
    Cancelled,

    /// Configuration validation error.
    #[snafu(display("Configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },

    /// Any other failure reported by a collaborator.
    #[snafu(display("{message}"))]
    Unknown {
        /// Best-effort message text.
        message: String,
    },
}

impl SdkError {
    /// Returns true if the error is transient and the operation should be retried.
    ///
    /// Retryable errors:
    /// - `Transport`: the round trip never reached the ledger
    /// - `Timeout`: confirmation did not arrive in time
    /// - `Conflict`: the precondition moved; re-reading may succeed
    ///
    /// Everything else is returned to the caller immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Timeout { .. } | Self::Conflict { .. })
    }

    /// Classifies the error for user-facing handling.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Codec { source: CodecError::Encode { .. }, .. } => ErrorCategory::Unknown,
            Self::Codec { .. } => ErrorCategory::Decode,
            Self::Unavailable => ErrorCategory::Availability,
            Self::UserRejected { .. } => ErrorCategory::UserRejected,
            Self::RegistryConflict { .. } => ErrorCategory::RegistryConflict,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Renders the message shown in the lifecycle `Error` state.
    ///
    /// User rejection and registry conflicts get their own distinct text; every
    /// other failure is reported as `"{failure_prefix}: {error}"`.
    #[must_use]
    pub fn user_message(&self, failure_prefix: &str) -> String {
        match self.category() {
            ErrorCategory::UserRejected => USER_REJECTED_MESSAGE.to_owned(),
            ErrorCategory::RegistryConflict => self.to_string(),
            _ => format!("{failure_prefix}: {self}"),
        }
    }

    /// Short machine-readable label, used for metrics and log fields.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::UserRejected { .. } => "user_rejected",
            Self::Chain { .. } => "chain",
            Self::Transport { .. } => "transport",
            Self::Conflict { .. } => "conflict",
            Self::RegistryConflict { .. } => "registry_conflict",
            Self::Codec { .. } => "codec",
            Self::Validation { .. } => "validation",
            Self::NotConnected => "not_connected",
            Self::Sortition { .. } => "sortition",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Timeout { .. } => "timeout",
            Self::Cancelled => "cancelled",
            Self::Config { .. } => "config",
            Self::Unknown { .. } => "unknown",
        }
    }
}

impl From<ValidationError> for SdkError {
    fn from(source: ValidationError) -> Self {
        Self::Validation { source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use committee_ledger_types::codec;

    use super::*;

    fn decode_error() -> SdkError {
        let source = codec::decode_index(b"not json").unwrap_err();
        SdkError::Codec { key: "member_keys".to_owned(), source }
    }

    #[test]
    fn test_categories() {
        assert_eq!(decode_error().category(), ErrorCategory::Decode);
        assert_eq!(SdkError::Unavailable.category(), ErrorCategory::Availability);
        assert_eq!(
            SdkError::UserRejected { message: "denied".to_owned() }.category(),
            ErrorCategory::UserRejected
        );
        assert_eq!(
            SdkError::RegistryConflict { attempts: 5 }.category(),
            ErrorCategory::RegistryConflict
        );
        assert_eq!(SdkError::Chain { message: "reverted".to_owned() }.category(), ErrorCategory::Unknown);
        assert_eq!(SdkError::Cancelled.category(), ErrorCategory::Unknown);
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = SdkError::Conflict { key: "member_keys".to_owned(), expected: Some(3), actual: Some(4) };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_transport_is_retryable() {
        let err = TransportSnafu { message: "connection reset" }.build();
        assert!(err.is_retryable());
        assert!(SdkError::Timeout { duration_ms: 10 }.is_retryable());
    }

    #[test]
    fn test_terminal_errors_not_retryable() {
        assert!(!SdkError::Unavailable.is_retryable());
        assert!(!SdkError::UserRejected { message: String::new() }.is_retryable());
        assert!(!SdkError::Chain { message: String::new() }.is_retryable());
        assert!(!SdkError::RegistryConflict { attempts: 1 }.is_retryable());
        assert!(!decode_error().is_retryable());
    }

    #[test]
    fn test_user_message_for_rejection() {
        let err = SdkError::UserRejected { message: "user rejected transaction".to_owned() };
        assert_eq!(err.user_message("Submission failed"), "Transaction rejected by user");
    }

    #[test]
    fn test_user_message_for_conflict_asks_to_retry() {
        let msg = SdkError::RegistryConflict { attempts: 5 }.user_message("Submission failed");
        assert!(msg.contains("please retry"));
        assert!(!msg.starts_with("Submission failed"));
    }

    #[test]
    fn test_user_message_generic() {
        let err = SdkError::Chain { message: "out of gas".to_owned() };
        assert_eq!(err.user_message("Submission failed"), "Submission failed: Chain error: out of gas");
        assert_eq!(
            SdkError::Unavailable.user_message("Sortition failed"),
            "Sortition failed: Ledger store is not available"
        );
    }

    #[test]
    fn test_validation_conversion() {
        let err: SdkError = committee_ledger_types::validation::validate_role("").unwrap_err().into();
        assert!(matches!(err, SdkError::Validation { .. }));
        assert_eq!(err.error_type(), "validation");
    }
}
