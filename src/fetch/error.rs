//! Error types for page fetching and the rendering fallback.

use std::time::Duration;

use thiserror::Error;

/// Errors from fetching one result page over plain HTTP.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// HTTP error response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },
}

impl FetchError {
    /// Maps a reqwest error, separating timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}

/// Errors from the rendering fallback.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The browser could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// Navigation to the page failed.
    #[error("failed to load {url} in browser: {message}")]
    Navigation { url: String, message: String },

    /// The element never appeared within the wait budget.
    #[error("element '{selector}' not found after {attempts} attempts ({per_attempt:?} each)")]
    ElementTimeout {
        selector: String,
        attempts: u32,
        per_attempt: Duration,
    },

    /// Any other browser protocol failure.
    #[error("browser error: {0}")]
    Protocol(String),

    /// Reading the manual resume signal failed.
    #[error("failed to read challenge resolution signal: {0}")]
    Resolver(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let msg = FetchError::http_status("https://scholar.example/scholar?start=0", 503).to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("start=0"));
    }

    #[test]
    fn test_render_error_timeout_display() {
        let msg = RenderError::ElementTimeout {
            selector: "body".to_string(),
            attempts: 5,
            per_attempt: Duration::from_secs(10),
        }
        .to_string();
        assert!(msg.contains("'body'"));
        assert!(msg.contains("5 attempts"));
    }
}
