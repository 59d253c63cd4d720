//! Errors raised while constructing the HTTP client.

use thiserror::Error;

/// Construction failures; request failures surface as `RemoteError` instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying `reqwest` client could not be built.
    #[error("failed to build HTTP client")]
    Build {
        /// Underlying builder failure.
        #[source]
        source: reqwest::Error,
    },
    /// The base URL cannot carry path segments (for example `mailto:`).
    #[error("base URL {url} cannot hold a resource path")]
    InvalidBaseUrl {
        /// Offending URL.
        url: String,
    },
    /// The resource name was blank.
    #[error("resource name must not be empty")]
    EmptyResource,
}

/// Convenience alias for client construction results.
pub type ClientResult<T> = Result<T, ClientError>;
