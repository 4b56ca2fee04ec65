//! Error taxonomy for client and store operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for client results.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the HTTP client, session store, and caches.
///
/// Local cache misses on update or delete are not errors; those operations
/// succeed without touching the cache.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("network request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The service rejected the credentials or the session is no longer valid.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Input was rejected before any request was issued.
    #[error("{0}")]
    Validation(String),
    /// The service answered with a non-success status other than 401.
    #[error("{message} (status {status})")]
    Server {
        /// HTTP status code returned by the service.
        status: u16,
        /// Server-provided message, or a generic description.
        message: String,
    },
    /// A success response lacked a field the client requires.
    #[error("unexpected response from {path}: {detail}")]
    Decode {
        /// Endpoint path that produced the response.
        path: String,
        /// What was missing or malformed.
        detail: String,
    },
    /// Reading or writing the persisted session failed.
    #[error("session storage failure at {path}")]
    Storage {
        /// File backing the session.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The persisted session document could not be (de)serialised.
    #[error("session document is invalid")]
    StorageFormat {
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// Client construction failed (bad base URL, TLS setup, headers).
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Build an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Whether this failure came from an authorization rejection.
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Message suitable for showing to an end user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(message) | Self::Validation(message) | Self::Server { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Reject blank user input with a validation error naming the field.
///
/// # Errors
///
/// Returns [`ClientError::Validation`] when `value` is empty after trimming.
pub fn require_non_empty(field: &str, value: &str) -> ClientResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn require_non_empty_trims_and_rejects_blank() {
        assert_eq!(
            require_non_empty("name", "  Milk ").expect("valid name"),
            "Milk"
        );
        let err = require_non_empty("name", "   ").expect_err("blank name");
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(err.to_string(), "name must not be empty");
    }

    #[test]
    fn server_error_display_includes_status() {
        let err = ClientError::Server {
            status: 500,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "boom (status 500)");
        assert_eq!(err.user_message(), "boom");
        assert!(!err.is_auth());
    }

    #[test]
    fn storage_error_exposes_source() {
        let err = ClientError::Storage {
            path: PathBuf::from("session.json"),
            source: io::Error::other("disk"),
        };
        assert!(err.source().is_some());
        assert!(ClientError::auth("expired").is_auth());
    }
}
