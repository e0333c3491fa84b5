//! Error types for mapier.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using mapier's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// PostgreSQL SQLSTATE for `unique_violation`.
const PG_UNIQUE_VIOLATION: &str = "23505";

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Why one provider was excluded from a fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProviderFailure {
    pub provider: String,
    /// "timeout" or "error"
    pub kind: String,
    pub message: String,
}

/// Core error type for mapier operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Malformed or out-of-range input
    #[error("Validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A provider did not answer within its timeout
    #[error("Provider {provider} timed out")]
    ProviderTimeout { provider: String },

    /// A provider answered with an error or could not be reached
    #[error("Provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Every enabled provider failed for one request
    #[error("All providers failed ({} attempted)", .0.len())]
    AllProvidersFailed(Vec<ProviderFailure>),

    /// The candidate matching query failed
    #[error("Conflation failed: {0}")]
    ConflationFailure(String),

    /// Uniqueness violation or identifier already held by a different value
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Cache backend failure (never surfaced to callers)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Convenience constructor for a single-field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation(vec![FieldError::new(field, message)])
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Database(_) => "database_error",
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::ProviderTimeout { .. } => "provider_timeout",
            Error::ProviderUnavailable { .. } => "provider_unavailable",
            Error::AllProvidersFailed(_) => "all_providers_failed",
            Error::ConflationFailure(_) => "conflation_failure",
            Error::Conflict(_) => "identifier_conflict",
            Error::Cache(_) => "cache_error",
            Error::Serialization(_) => "serialization_error",
            Error::Config(_) => "configuration_error",
            Error::Request(_) => "request_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// True when this wraps a PostgreSQL unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
            }
            Error::Conflict(_) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("place abc".to_string());
        assert_eq!(err.to_string(), "Not found: place abc");
    }

    #[test]
    fn test_error_display_validation_joins_fields() {
        let err = Error::Validation(vec![
            FieldError::new("location.lat", "must be within [-90, 90]"),
            FieldError::new("limit", "must be at most 100"),
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: location.lat: must be within [-90, 90]; limit: must be at most 100"
        );
    }

    #[test]
    fn test_error_display_provider_timeout() {
        let err = Error::ProviderTimeout {
            provider: "google".to_string(),
        };
        assert_eq!(err.to_string(), "Provider google timed out");
    }

    #[test]
    fn test_error_display_all_providers_failed() {
        let err = Error::AllProvidersFailed(vec![
            ProviderFailure {
                provider: "local".to_string(),
                kind: "error".to_string(),
                message: "boom".to_string(),
            },
            ProviderFailure {
                provider: "google".to_string(),
                kind: "timeout".to_string(),
                message: "timed out".to_string(),
            },
        ]);
        assert_eq!(err.to_string(), "All providers failed (2 attempted)");
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::validation("name", "required").code(), "validation_error");
        assert_eq!(Error::NotFound("x".into()).code(), "not_found");
        assert_eq!(Error::AllProvidersFailed(vec![]).code(), "all_providers_failed");
        assert_eq!(Error::ConflationFailure("rpc".into()).code(), "conflation_failure");
        assert_eq!(Error::Conflict("dup".into()).code(), "identifier_conflict");
        assert_eq!(Error::Cache("down".into()).code(), "cache_error");
        assert_eq!(
            Error::ProviderUnavailable {
                provider: "google".into(),
                reason: "503".into()
            }
            .code(),
            "provider_unavailable"
        );
    }

    #[test]
    fn test_conflict_counts_as_unique_violation() {
        assert!(Error::Conflict("google_place_id".into()).is_unique_violation());
        assert!(!Error::NotFound("x".into()).is_unique_violation());
        assert!(!Error::Database(sqlx::Error::RowNotFound).is_unique_violation());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
