//! Download manager for concurrent PDF downloads with retry support.
//!
//! The manager takes a batch of [`DownloadJob`]s (one per record that has a
//! candidate link), downloads them under a semaphore-bounded concurrency cap,
//! and returns exactly one [`DownloadOutcome`] per job, keyed by record id.
//!
//! # Example
//!
//! ```no_run
//! use sortgs_core::download::{DownloadJob, DownloadManager, HttpClient, RetryPolicy};
//! use std::path::PathBuf;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DownloadManager::new(10, RetryPolicy::default())?;
//! let client = HttpClient::new()?;
//! let jobs = vec![DownloadJob {
//!     id: "paper_0000".to_string(),
//!     url: "https://example.com/paper.pdf".to_string(),
//!     dest: PathBuf::from("./PDFs/paper_0000.pdf"),
//! }];
//! for outcome in manager.download_batch(&client, jobs).await? {
//!     println!("{}: {}", outcome.id, outcome.status);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use super::retry::{RetryDecision, RetryPolicy, classify_error};
use super::{DownloadError, HttpClient};
use crate::record::DownloadStatus;

/// Minimum allowed concurrency value.
pub(crate) const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub(crate) const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Error type for download manager operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// One document to fetch for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    /// Record identifier the outcome is reported under.
    pub id: String,
    /// Candidate PDF URL.
    pub url: String,
    /// Final file path, `<dir>/<id>.pdf`.
    pub dest: PathBuf,
}

/// Terminal result of one [`DownloadJob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub id: String,
    /// `Succeeded`, `FailedNetwork` or `FailedNotPdf`.
    pub status: DownloadStatus,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Written file on success.
    pub path: Option<PathBuf>,
}

/// Counters accumulated over every batch run by one manager.
///
/// Atomic so the spawned download tasks can update them concurrently.
#[derive(Debug, Default)]
pub struct DownloadStats {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    retried: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of successfully downloaded documents.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the total number of jobs processed (succeeded + failed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }

    /// Returns the number of retry attempts made.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    fn increment_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }
}

/// Concurrent downloader with a fixed concurrency cap and retry policy.
///
/// # Concurrency Model
///
/// - Each job runs in its own Tokio task
/// - A semaphore permit is acquired before starting each download
/// - Permits are released automatically when downloads complete (RAII)
/// - Outcomes are returned in job order, whatever order tasks finish in
#[derive(Debug)]
pub struct DownloadManager {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    stats: Arc<DownloadStats>,
}

impl DownloadManager {
    /// Creates a manager with the given concurrency cap and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_attempts = retry_policy.max_attempts(),
            retry_delay_ms = retry_policy.delay().as_millis(),
            "creating download manager"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            stats: Arc::new(DownloadStats::new()),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns counters accumulated across all batches.
    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Downloads every job and returns one outcome per job, in job order.
    ///
    /// Destination directories are created before any download starts.
    /// Individual download failures never fail the batch; they surface as
    /// `FailedNetwork` or `FailedNotPdf` outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    #[instrument(skip(self, client, jobs), fields(jobs = jobs.len()))]
    pub async fn download_batch(
        &self,
        client: &HttpClient,
        jobs: Vec<DownloadJob>,
    ) -> Result<Vec<DownloadOutcome>, EngineError> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let dirs: BTreeSet<PathBuf> = jobs
            .iter()
            .filter_map(|job| job.dest.parent().map(std::path::Path::to_path_buf))
            .collect();
        for dir in dirs {
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                // Downloads into this directory will fail individually.
                warn!(dir = %dir.display(), error = %e, "failed to create download directory");
            }
        }

        info!(count = jobs.len(), "starting download batch");

        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| EngineError::SemaphoreClosed)?;

            let client = client.clone();
            let stats = Arc::clone(&self.stats);
            let retry_policy = self.retry_policy.clone();
            let id = job.id.clone();

            handles.push((
                id,
                tokio::spawn(async move {
                    let _permit = permit;

                    match download_with_retry(&client, &job, &retry_policy, &stats).await {
                        Ok(attempts) => {
                            info!(id = %job.id, path = %job.dest.display(), attempts, "download succeeded");
                            stats.increment_succeeded();
                            DownloadOutcome {
                                id: job.id,
                                status: DownloadStatus::Succeeded,
                                attempts,
                                path: Some(job.dest),
                            }
                        }
                        Err((e, attempts)) => {
                            warn!(
                                id = %job.id,
                                url = %job.url,
                                error = %e,
                                attempts,
                                "download failed"
                            );
                            stats.increment_failed();
                            DownloadOutcome {
                                id: job.id,
                                status: e.terminal_status(),
                                attempts,
                                path: None,
                            }
                        }
                    }
                }),
            ));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (id, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(id = %id, error = %e, "download task panicked");
                    self.stats.increment_failed();
                    outcomes.push(DownloadOutcome {
                        id,
                        status: DownloadStatus::FailedNetwork,
                        attempts: 0,
                        path: None,
                    });
                }
            }
        }

        info!(
            succeeded = outcomes
                .iter()
                .filter(|o| o.status == DownloadStatus::Succeeded)
                .count(),
            total = outcomes.len(),
            "download batch complete"
        );

        Ok(outcomes)
    }
}

/// Downloads one job, retrying transient failures.
///
/// Returns the attempt count on success, or the final error and attempt
/// count once the policy gives up.
#[instrument(skip(client, job, policy, stats), fields(id = %job.id, url = %job.url))]
async fn download_with_retry(
    client: &HttpClient,
    job: &DownloadJob,
    policy: &RetryPolicy,
    stats: &DownloadStats,
) -> Result<u32, (DownloadError, u32)> {
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(attempt, "attempting download");

        match client.download_pdf(&job.url, &job.dest).await {
            Ok(_) => return Ok(attempt),
            Err(e) => match policy.should_retry(classify_error(&e), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying download"
                    );
                    stats.increment_retried();
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(%reason, "not retrying download");
                    return Err((e, attempt));
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_new_valid_concurrency() {
        for value in [1, DEFAULT_CONCURRENCY, 100] {
            let manager = DownloadManager::new(value, RetryPolicy::default()).unwrap();
            assert_eq!(manager.concurrency(), value);
        }
    }

    #[test]
    fn test_manager_new_invalid_concurrency() {
        assert!(matches!(
            DownloadManager::new(0, RetryPolicy::default()),
            Err(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert!(matches!(
            DownloadManager::new(101, RetryPolicy::default()),
            Err(EngineError::InvalidConcurrency { value: 101 })
        ));
    }

    #[test]
    fn test_manager_stores_retry_policy() {
        let manager = DownloadManager::new(10, RetryPolicy::with_max_attempts(5)).unwrap();
        assert_eq!(manager.retry_policy().max_attempts(), 5);
    }

    #[tokio::test]
    async fn test_empty_batch_returns_no_outcomes() {
        let manager = DownloadManager::new(2, RetryPolicy::default()).unwrap();
        let client = HttpClient::new().unwrap();
        let outcomes = manager.download_batch(&client, Vec::new()).await.unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(manager.stats().total(), 0);
    }

    #[test]
    fn test_download_stats_thread_safe() {
        use std::thread;

        let stats = Arc::new(DownloadStats::new());
        let mut handles = Vec::new();

        for _ in 0..10 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats.increment_succeeded();
                    stats.increment_failed();
                    stats.increment_retried();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.succeeded(), 1000);
        assert_eq!(stats.failed(), 1000);
        assert_eq!(stats.retried(), 1000);
        assert_eq!(stats.total(), 2000);
    }

    #[test]
    fn test_engine_error_display() {
        let msg = EngineError::InvalidConcurrency { value: 0 }.to_string();
        assert!(msg.contains("invalid concurrency"));
        assert!(msg.contains("100"));
    }
}
