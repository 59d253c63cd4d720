//! Error types for list controller operations.

use std::error::Error;

use thiserror::Error;

use crate::model::Identifier;

/// Failure talking to the remote collection. Any variant means the operation
/// was not applied remotely.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response (connection, timeout, DNS).
    #[error("remote {operation} failed")]
    Transport {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The server answered with a non-success status.
    #[error("remote {operation} rejected with status {status}")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body or problem detail, possibly empty.
        detail: String,
    },
    /// The server answered but the body could not be decoded.
    #[error("remote {operation} returned an unreadable body")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl RemoteError {
    /// Operation identifier carried by every variant.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Transport { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }
}

/// Convenience alias for remote results.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors surfaced inline by the list controller. None of these are fatal.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input was rejected before any cache mutation or remote call.
    #[error("invalid {field}: {reason}")]
    Validation {
        /// Field that failed validation.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// No item with this identifier is currently in the collection.
    #[error("item {id} not found")]
    NotFound {
        /// Missing identifier.
        id: Identifier,
    },
    /// The item has not been confirmed by the server yet.
    #[error("item {id} has not been saved yet")]
    Unconfirmed {
        /// Pending identifier.
        id: Identifier,
    },
    /// A bulk selection exceeded the safety threshold.
    #[error(transparent)]
    Selection(#[from] SelectionError),
    /// The remote call failed (reported after any rollback was applied).
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl CoreError {
    /// Whether the error was raised before touching the cache or the remote.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(self, Self::Remote(_))
    }
}

/// Convenience alias for controller results.
pub type CoreResult<T> = Result<T, CoreError>;

/// Selection refusals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Selecting every candidate would exceed the bulk-operation threshold.
    #[error("refusing to select {requested} items; the limit is {limit}")]
    TooMany {
        /// Number of candidates offered.
        requested: usize,
        /// Configured threshold.
        limit: usize,
    },
}

/// Failures reading or writing the session store.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backing file could not be read or written.
    #[error("session file {path} is not accessible")]
    Io {
        /// Session file path.
        path: String,
        /// Underlying IO failure.
        #[source]
        source: std::io::Error,
    },
    /// The backing file holds something other than a JSON object of strings.
    #[error("session file {path} is not valid JSON")]
    Malformed {
        /// Session file path.
        path: String,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn remote_errors_expose_operation_and_source() {
        let err = RemoteError::Transport {
            operation: "list",
            source: Box::new(io::Error::other("connection refused")),
        };
        assert_eq!(err.to_string(), "remote list failed");
        assert_eq!(err.operation(), "list");
        assert!(err.source().is_some());

        let rejected = RemoteError::Rejected {
            operation: "update",
            status: 500,
            detail: String::new(),
        };
        assert_eq!(
            rejected.to_string(),
            "remote update rejected with status 500"
        );
    }

    #[test]
    fn core_errors_classify_rejections() {
        let validation = CoreError::Validation {
            field: "title",
            reason: "must be at least 3 characters".into(),
        };
        assert!(validation.is_rejection());
        assert_eq!(
            validation.to_string(),
            "invalid title: must be at least 3 characters"
        );

        let remote: CoreError = RemoteError::Rejected {
            operation: "create",
            status: 503,
            detail: "busy".into(),
        }
        .into();
        assert!(!remote.is_rejection());
    }
}
