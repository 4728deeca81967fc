//! sortgs core library
//!
//! Collects scholar search results page by page, downloads the PDFs they
//! link to, and ranks the collected records by citations or any other
//! output column. Work is checkpointed after every page so an interrupted
//! run resumes where it stopped.
//!
//! # Architecture
//!
//! - [`pipeline`] - pagination driver and run state
//! - [`fetch`] - result page retrieval with challenge escalation
//! - [`extract`] - per-entry field and link extraction
//! - [`download`] - concurrent PDF downloads with retry
//! - [`checkpoint`] - append-per-page resumable record store
//! - [`aggregate`] - merge, citations per year, sorted views
//! - [`output`] - final CSV and console summary

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod checkpoint;
pub mod config;
pub mod download;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod record;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;

// Re-export commonly used types
pub use aggregate::{CIT_PER_YEAR_COLUMN, Dataset, RankedRecord, SortColumn, SortedView, merge};
pub use checkpoint::{CHECKPOINT_HEADER, CheckpointError, CheckpointStore};
pub use config::{ConfigError, DelayRange, RunConfig, SUPPORTED_LANGUAGES};
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadError, DownloadJob, DownloadManager,
    DownloadOutcome, DownloadStats, EngineError, FailureType, HttpClient, RetryDecision,
    RetryPolicy, classify_error,
};
pub use extract::{ExtractedEntry, LinkCandidate, parse_entries};
pub use fetch::{
    ChallengeResolver, ChromeLauncher, FetchError, FetchedPage, PageFetcher, PageSource,
    RenderBackend, RenderError, RenderLauncher, RenderSession, TerminalPrompt,
};
pub use pipeline::{Phase, Pipeline, PipelineError, RunReport};
pub use query::SearchQuery;
pub use record::{DownloadStatus, Record, RecordSet, record_id};
pub use user_agent::BROWSER_USER_AGENT;
