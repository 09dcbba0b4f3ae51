//! Error types for the shellcache library.

use thiserror::Error;

/// Errors that can occur during cache worker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error from a cache store backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest or sidecar JSON could not be parsed or serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Upstream returned a non-success status during a bulk fetch.
    #[error("upstream returned {status} for {url}")]
    Status {
        /// URL that was requested.
        url: String,
        /// HTTP status code of the response.
        status: u16,
    },

    /// The worker event loop is no longer running.
    #[error("worker event loop terminated")]
    Terminated,
}

/// A specialized `Result` type for shellcache operations.
pub type Result<T> = std::result::Result<T, Error>;
