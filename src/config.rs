//! Run configuration for a search-and-rank run.
//!
//! [`RunConfig`] is built by the binary from command-line flags and validated
//! once before the pipeline starts. It also owns the derivation of every path
//! the run writes to (output CSV, checkpoint, PDF directory).

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Datelike;
use rand::Rng;
use thiserror::Error;

use crate::download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, MAX_CONCURRENCY, MIN_CONCURRENCY,
};

/// Results per upstream page.
pub const PAGE_SIZE: usize = 10;

/// Default number of results to fetch.
pub const DEFAULT_TARGET_COUNT: usize = 100;

/// Default sort column of the final dataset.
pub const DEFAULT_SORT_COLUMN: &str = "Citations";

/// Language codes accepted by the upstream language filter.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "zh-CN", "zh-TW", "nl", "en", "fr", "de", "it", "ja", "ko", "pl", "pt", "es", "tr",
];

/// Live upstream search host.
pub const SCHOLAR_BASE_URL: &str = "https://scholar.google.com";

/// Archived snapshot of the upstream used in debug mode.
pub const ARCHIVE_BASE_URL: &str =
    "https://web.archive.org/web/20210314203256/https://scholar.google.com";

/// Maximum length, in characters, of the output CSV path.
pub const MAX_OUTPUT_PATH_LEN: usize = 255;

/// Directory under the output directory that receives PDFs.
pub const PDF_DIR_NAME: &str = "PDFs";

const MAX_CHECKPOINT_STEM_LEN: usize = 200;

/// Errors raised by [`RunConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Search term is empty or whitespace.
    #[error("search term must not be empty")]
    EmptyQuery,

    /// Requested zero results.
    #[error("number of results must be at least 1")]
    ZeroTarget,

    /// Concurrency outside the allowed range.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The rejected value.
        value: usize,
    },

    /// Start year after end year.
    #[error("start year {start} is after end year {end}")]
    InvertedYearRange {
        /// Requested start year.
        start: i32,
        /// Requested end year.
        end: i32,
    },

    /// Language code not supported by the upstream filter.
    #[error("unsupported language code '{code}' (supported: {})", SUPPORTED_LANGUAGES.join(", "))]
    UnsupportedLanguage {
        /// The rejected code.
        code: String,
    },

    /// Page delay range with min above max.
    #[error("page delay minimum {min_ms}ms exceeds maximum {max_ms}ms")]
    InvertedDelayRange {
        /// Minimum delay in milliseconds.
        min_ms: u128,
        /// Maximum delay in milliseconds.
        max_ms: u128,
    },
}

/// Uniformly random delay, used between page fetches and element waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayRange {
    min: Duration,
    max: Duration,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_millis(3000),
        }
    }
}

impl DelayRange {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// No delay at all; used by tests and local mirrors.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Range of delays in milliseconds.
    #[must_use]
    pub fn range_ms(&self) -> RangeInclusive<u64> {
        let min = u64::try_from(self.min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        min..=max
    }

    /// Draws one delay from the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        let range = self.range_ms();
        if range.start() >= range.end() {
            return Duration::from_millis(*range.start());
        }
        Duration::from_millis(rand::thread_rng().gen_range(range))
    }

    /// Sleeps for one sampled delay.
    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Configuration of one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Search term, sent verbatim apart from URL encoding.
    pub query: String,
    /// Number of results to collect.
    pub target_count: usize,
    /// Output column the final dataset is sorted by (descending).
    pub sort_by: String,
    /// Permitted languages; empty means all.
    pub languages: Vec<String>,
    pub start_year: Option<i32>,
    pub end_year: i32,
    /// Write the sorted dataset to CSV.
    pub save_csv: bool,
    /// Directory for the CSV, the checkpoint and the PDF folder.
    pub output_dir: PathBuf,
    /// Fetch from the archived snapshot instead of the live upstream.
    pub debug: bool,
    /// Download PDFs for entries that offer one.
    pub download_pdfs: bool,
    /// Escalate challenge pages to a rendering browser.
    pub browser_fallback: bool,
    /// Concurrent downloads per page.
    pub concurrency: usize,
    /// Download attempts per document, including the first.
    pub max_attempts: u32,
    /// Fixed delay between download attempts.
    pub retry_delay: Duration,
    pub page_delay: DelayRange,
    /// Overrides the upstream host (mirrors, tests).
    pub base_url: Option<String>,
}

impl RunConfig {
    /// Creates a configuration with defaults for everything but the term.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            target_count: DEFAULT_TARGET_COUNT,
            sort_by: DEFAULT_SORT_COLUMN.to_string(),
            languages: Vec::new(),
            start_year: None,
            end_year: current_year(),
            save_csv: true,
            output_dir: PathBuf::from("."),
            debug: false,
            download_pdfs: true,
            browser_fallback: true,
            concurrency: DEFAULT_CONCURRENCY,
            max_attempts: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            page_delay: DelayRange::default(),
            base_url: None,
        }
    }

    /// Checks value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query.trim().is_empty() {
            return Err(ConfigError::EmptyQuery);
        }
        if self.target_count == 0 {
            return Err(ConfigError::ZeroTarget);
        }
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        if let Some(start) = self.start_year
            && start > self.end_year
        {
            return Err(ConfigError::InvertedYearRange {
                start,
                end: self.end_year,
            });
        }
        if let Some(code) = self
            .languages
            .iter()
            .find(|code| !SUPPORTED_LANGUAGES.contains(&code.as_str()))
        {
            return Err(ConfigError::UnsupportedLanguage { code: code.clone() });
        }
        if self.page_delay.min > self.page_delay.max {
            return Err(ConfigError::InvertedDelayRange {
                min_ms: self.page_delay.min.as_millis(),
                max_ms: self.page_delay.max.as_millis(),
            });
        }
        Ok(())
    }

    /// File stem derived from the search term.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.query
            .chars()
            .map(|c| match c {
                ' ' | ':' | '/' | '\\' => '_',
                other => other,
            })
            .collect()
    }

    /// Path of the final sorted CSV, capped at [`MAX_OUTPUT_PATH_LEN`] characters.
    #[must_use]
    pub fn output_csv_path(&self) -> PathBuf {
        let full = self.output_dir.join(format!("{}.csv", self.file_stem()));
        let capped: String = full
            .to_string_lossy()
            .chars()
            .take(MAX_OUTPUT_PATH_LEN)
            .collect();
        PathBuf::from(capped)
    }

    /// Path of the resumable checkpoint file.
    #[must_use]
    pub fn checkpoint_path(&self) -> PathBuf {
        let stem: String = self.file_stem().chars().take(MAX_CHECKPOINT_STEM_LEN).collect();
        self.output_dir.join(format!("{stem}.checkpoint.csv"))
    }

    /// Directory that receives downloaded PDFs.
    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.output_dir.join(PDF_DIR_NAME)
    }

    /// Host used for result pages.
    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        if let Some(base) = self.base_url.as_deref() {
            return base.trim_end_matches('/');
        }
        if self.debug {
            ARCHIVE_BASE_URL
        } else {
            SCHOLAR_BASE_URL
        }
    }

    /// Output directory as a path reference.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Current calendar year in local time.
#[must_use]
pub fn current_year() -> i32 {
    chrono::Local::now().year()
}
