//! HTTP client wrapper for downloading PDF documents.
//!
//! This module provides the `HttpClient` struct which streams a response to
//! disk after checking that it actually is a PDF.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, PARTIAL_SUFFIX, PDF_MAGIC, PDF_MEDIA_TYPE, READ_TIMEOUT_SECS, SNIFF_LEN,
};
use super::error::DownloadError;
use crate::user_agent;

/// HTTP client for downloading documents with streaming support.
///
/// Create once and share: clones reuse the same connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 5min read).
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::download_user_agent())
            .build()?;
        Ok(Self { client })
    }

    /// Downloads the PDF at `url` to `dest`, returning the bytes written.
    ///
    /// The response is accepted when its `Content-Type` media type is
    /// `application/pdf` or the URL path ends in `.pdf`. Otherwise the first
    /// bytes of the body must start with `%PDF`.
    ///
    /// Bytes go to `<dest>.part` first; `dest` is only replaced by a rename
    /// once the whole body has been written and flushed.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns an error status (4xx, 5xx)
    /// - The body is not a PDF
    /// - Writing to disk fails
    #[instrument(skip(self, dest), fields(url = %url, dest = %dest.display()))]
    pub async fn download_pdf(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let parsed_url =
            Url::parse(url).map_err(|_| DownloadError::invalid_url(url.to_string()))?;

        let response = self.send_request(url).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let declared_pdf =
            content_type.as_deref().is_some_and(is_pdf_media_type) || has_pdf_path(&parsed_url);

        let mut stream = response.bytes_stream();
        let mut prefix: Vec<u8> = Vec::new();

        if !declared_pdf {
            while prefix.len() < SNIFF_LEN {
                match stream.next().await {
                    Some(chunk) => {
                        let chunk = chunk.map_err(|e| read_error(url, e))?;
                        prefix.extend_from_slice(&chunk);
                    }
                    None => break,
                }
            }
            if !prefix.starts_with(PDF_MAGIC) {
                debug!(content_type = ?content_type, sniffed = prefix.len(), "response is not a PDF");
                return Err(DownloadError::not_pdf(url, content_type));
            }
        }

        let part_path = partial_path(dest);
        let write_result = write_body(&part_path, &prefix, stream, url).await;
        let bytes_written = match write_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %part_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&part_path).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part_path, dest)
            .await
            .map_err(|e| DownloadError::io(dest.to_path_buf(), e))?;

        info!(path = %dest.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }

    async fn send_request(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        if !response.status().is_success() {
            return Err(DownloadError::http_status(url, response.status().as_u16()));
        }

        Ok(response)
    }
}

/// Writes the sniffed prefix and the rest of the stream to `part_path`.
async fn write_body<S, B>(
    part_path: &Path,
    prefix: &[u8],
    mut stream: S,
    url: &str,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
{
    let file = File::create(part_path)
        .await
        .map_err(|e| DownloadError::io(part_path.to_path_buf(), e))?;
    let mut writer = BufWriter::new(file);

    writer
        .write_all(prefix)
        .await
        .map_err(|e| DownloadError::io(part_path.to_path_buf(), e))?;
    let mut bytes_written = prefix.len() as u64;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| read_error(url, e))?;
        let chunk = chunk.as_ref();

        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(part_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(part_path.to_path_buf(), e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(part_path.to_path_buf(), e))?;

    Ok(bytes_written)
}

fn read_error(url: &str, e: reqwest::Error) -> DownloadError {
    if e.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, e)
    }
}

/// `<dest>.part`, next to the destination.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Compares the media type (before any `;` parameters) case-insensitively.
fn is_pdf_media_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case(PDF_MEDIA_TYPE))
}

fn has_pdf_path(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".pdf")
}
