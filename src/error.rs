//! Error types for the KVdb client

use std::io;
use thiserror::Error;

/// Errors that can occur when talking to a KVdb bucket
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid input, raised before any request is sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// The server answered with a non-2xx status
    #[error("KVdb request failed: {status} {status_text}")]
    Request {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase for the status
        status_text: String,
        /// Raw response body text
        body: String,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error while encoding a request body
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request timeout
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    Tls(String),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status of a failed request, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for a 404 answer
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;
