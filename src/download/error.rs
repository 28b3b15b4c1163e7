//! Error types for the transfer layer.

use thiserror::Error;

/// Errors that can occur while moving bytes from a source to a sink.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP error response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Reading the source or writing the sink failed.
    #[error("IO error during transfer: {source}")]
    Io {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Received byte count differs from the announced length.
    #[error(
        "content too {}: expected {expected} bytes, received {actual}\n  Suggestion: retry the download; the body did not match the announced length",
        length_mismatch(.expected, .actual)
    )]
    ContentLengthMismatch {
        /// Declared length.
        expected: u64,
        /// Bytes actually received.
        actual: u64,
    },

    /// The transfer was cancelled by an external interrupt.
    #[error("transfer interrupted")]
    Interrupted,
}

/// Describes a received length relative to the announced one.
#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn length_mismatch(expected: &u64, actual: &u64) -> &'static str {
    if actual < expected { "short" } else { "long" }
}

impl TransferError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io { source }
    }
}

impl From<std::io::Error> for TransferError {
    fn from(source: std::io::Error) -> Self {
        Self::io(source)
    }
}
