//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use sortgs_core::config::{DEFAULT_SORT_COLUMN, DEFAULT_TARGET_COUNT, current_year};
use sortgs_core::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DelayRange, RunConfig};

/// Rank scholar search results by citations.
///
/// Fetches result pages for a search term, downloads linked PDFs, and saves
/// the collected records sorted by the chosen column. Interrupted runs resume
/// from the last completed page.
#[derive(Parser, Debug)]
#[command(name = "sortgs")]
#[command(author, version, about)]
pub struct Args {
    /// Search term
    pub kw: String,

    /// Column to sort by (e.g. Citations, Year, cit/year)
    #[arg(long, default_value = DEFAULT_SORT_COLUMN)]
    pub sortby: String,

    /// Only include results in these languages (e.g. en de zh-CN)
    #[arg(long, num_args = 1..)]
    pub langfilter: Vec<String>,

    /// Number of results to collect
    #[arg(long, default_value_t = DEFAULT_TARGET_COUNT)]
    pub nresults: usize,

    /// Directory for the output CSV, checkpoint and PDFs (default: current directory)
    #[arg(long)]
    pub csvpath: Option<PathBuf>,

    /// Do not save the sorted CSV
    #[arg(long)]
    pub notsavecsv: bool,

    /// Earliest publication year
    #[arg(long)]
    pub startyear: Option<i32>,

    /// Latest publication year (default: current year)
    #[arg(long)]
    pub endyear: Option<i32>,

    /// Fetch from an archived snapshot of the search page (filters ignored)
    #[arg(long)]
    pub debug: bool,

    /// Maximum concurrent downloads (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Download attempts per document for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Minimum delay between result pages in milliseconds
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub min_delay: u64,

    /// Maximum delay between result pages in milliseconds
    #[arg(long, default_value_t = 3000, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub max_delay: u64,

    /// Alternative search host, e.g. a mirror (overrides --debug's archive)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Skip PDF downloads
    #[arg(long)]
    pub no_download: bool,

    /// Never open a browser for challenge pages
    #[arg(long)]
    pub no_browser: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Maps parsed flags onto a library configuration. Not yet validated.
    #[must_use]
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::new(self.kw.clone());
        config.sort_by.clone_from(&self.sortby);
        config.languages.clone_from(&self.langfilter);
        config.target_count = self.nresults;
        if let Some(dir) = &self.csvpath {
            config.output_dir.clone_from(dir);
        }
        config.save_csv = !self.notsavecsv;
        config.start_year = self.startyear;
        config.end_year = self.endyear.unwrap_or_else(current_year);
        config.debug = self.debug;
        config.concurrency = usize::from(self.concurrency);
        config.max_attempts = u32::from(self.max_retries);
        config.page_delay = DelayRange::new(
            Duration::from_millis(self.min_delay),
            Duration::from_millis(self.max_delay),
        );
        config.base_url.clone_from(&self.base_url);
        config.download_pdfs = !self.no_download;
        config.browser_fallback = !self.no_browser;
        config
    }
}
