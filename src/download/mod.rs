//! PDF download subsystem.
//!
//! - [`HttpClient`] streams one document to disk after verifying it is a PDF
//! - [`DownloadManager`] runs a batch of jobs under a concurrency cap with
//!   fixed-delay retries, reporting one outcome per record id
//!
//! Downloads go to `<dest>.part` and are renamed into place only when
//! complete, so an existing destination is never partially overwritten.

mod client;
mod constants;
mod engine;
mod error;
mod retry;

pub use client::HttpClient;
pub use constants::DEFAULT_RETRY_DELAY;
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadJob, DownloadManager, DownloadOutcome, DownloadStats, EngineError,
};
pub(crate) use engine::{MAX_CONCURRENCY, MIN_CONCURRENCY};
pub use error::DownloadError;
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};
