//! Error types for the download module.

use std::path::PathBuf;

use thiserror::Error;

use crate::record::DownloadStatus;

/// Errors that can occur while downloading a document.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the document.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The server answered with something other than a PDF.
    #[error("not a PDF at {url} (content-type: {})", content_type.as_deref().unwrap_or("none"))]
    NotPdf {
        /// The URL that was fetched.
        url: String,
        /// Content-Type header, if the server sent one.
        content_type: Option<String>,
    },
}

impl DownloadError {
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

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a not-a-PDF error.
    pub fn not_pdf(url: impl Into<String>, content_type: Option<String>) -> Self {
        Self::NotPdf {
            url: url.into(),
            content_type,
        }
    }

    /// Terminal record status for this error once retries are exhausted.
    #[must_use]
    pub fn terminal_status(&self) -> DownloadStatus {
        match self {
            Self::NotPdf { .. } => DownloadStatus::FailedNotPdf,
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::Io { .. }
            | Self::InvalidUrl { .. } => DownloadStatus::FailedNetwork,
        }
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs the
// url or path, so callers go through the constructors above.
