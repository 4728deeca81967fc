//! Pagination driver: resume, fetch, extract, download, checkpoint.
//!
//! Pages are processed strictly in order. A page's records are appended to
//! the checkpoint, with their final download status, before the next page is
//! requested, so an interruption loses at most the page in flight.

mod error;
mod phase;

use std::path::PathBuf;

use tracing::{info, instrument, warn};

pub use error::PipelineError;
pub use phase::{Phase, RunState};

use crate::aggregate::{Dataset, SortColumn, merge};
use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::config::{PAGE_SIZE, RunConfig};
use crate::download::{DownloadJob, DownloadManager, HttpClient, RetryPolicy};
use crate::extract::{ExtractedEntry, LinkCandidate, parse_entries, resolve_external_pdf};
use crate::fetch::{PageFetcher, RenderSession};
use crate::output;
use crate::query::SearchQuery;
use crate::record::{DownloadStatus, Record, RecordSet};

/// Summary of a completed run.
#[derive(Debug)]
pub struct RunReport {
    /// Merged dataset in rank order.
    pub dataset: Dataset,
    /// Column the saved output was sorted by.
    pub sort_column: SortColumn,
    /// Requested sort column when it was unknown.
    pub sort_fallback: Option<String>,
    /// Written CSV, when saving is enabled.
    pub csv_path: Option<PathBuf>,
    /// Records taken from the checkpoint.
    pub resumed: usize,
    pub pages_fetched: usize,
}

/// Drives one search from checkpoint to final dataset.
#[derive(Debug)]
pub struct Pipeline {
    config: RunConfig,
    query: SearchQuery,
    fetcher: PageFetcher,
    downloads: HttpClient,
    manager: DownloadManager,
    checkpoint: CheckpointStore,
    session: Option<RenderSession>,
}

impl Pipeline {
    /// Validates `config` and builds the HTTP clients.
    ///
    /// No rendering fallback is attached; see [`Pipeline::with_render_session`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] for an invalid configuration and
    /// [`PipelineError::Client`] if a client cannot be built.
    pub fn new(config: RunConfig) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;

        let fetcher = PageFetcher::new().map_err(PipelineError::Client)?;
        let downloads = HttpClient::new().map_err(PipelineError::Client)?;
        let manager = DownloadManager::new(
            config.concurrency,
            RetryPolicy::new(config.max_attempts, config.retry_delay),
        )
        .map_err(PipelineError::Engine)?;

        Ok(Self {
            query: SearchQuery::from_config(&config),
            checkpoint: CheckpointStore::new(config.checkpoint_path()),
            config,
            fetcher,
            downloads,
            manager,
            session: None,
        })
    }

    /// Attaches the browser session used when a challenge page is served.
    #[must_use]
    pub fn with_render_session(mut self, session: RenderSession) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    #[must_use]
    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    #[must_use]
    pub fn download_manager(&self) -> &DownloadManager {
        &self.manager
    }

    /// Runs to completion: collects, sorts, saves, then clears the checkpoint.
    ///
    /// The browser session is shut down on every exit path. When saving
    /// fails the checkpoint is kept so the next run resumes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a checkpoint cannot be written, the
    /// output cannot be saved, or the download manager fails.
    #[instrument(skip(self), fields(query = %self.config.query, target = self.config.target_count))]
    pub async fn run(&mut self) -> Result<RunReport, PipelineError> {
        let result = self.run_to_completion().await;
        if let Some(session) = self.session.as_mut() {
            session.shutdown().await;
        }
        result
    }

    async fn run_to_completion(&mut self) -> Result<RunReport, PipelineError> {
        let state = self.collect_pages().await?;
        let resumed = state.resume_offset();
        let pages_fetched = state.pages_fetched();
        let dataset = self.finish(state);

        let view = dataset.sorted_by(&self.config.sort_by);
        let sort_column = view.column;
        let sort_fallback = view.fallback.clone();
        let csv_path = if self.config.save_csv {
            let path = self.config.output_csv_path();
            output::write_csv(&view, &path).map_err(PipelineError::Output)?;
            Some(path)
        } else {
            None
        };
        drop(view);

        self.checkpoint.clear().map_err(PipelineError::Checkpoint)?;

        Ok(RunReport {
            dataset,
            sort_column,
            sort_fallback,
            csv_path,
            resumed,
            pages_fetched,
        })
    }

    /// Fetches the remaining pages and merges them with the checkpoint.
    ///
    /// Neither saves output nor clears the checkpoint.
    ///
    /// # Errors
    ///
    /// Same as [`Pipeline::run`], minus output errors.
    pub async fn collect(&mut self) -> Result<Dataset, PipelineError> {
        let state = self.collect_pages().await?;
        Ok(self.finish(state))
    }

    fn finish(&self, mut state: RunState) -> Dataset {
        state.enter(Phase::Done);
        let (prior, fresh) = state.into_parts();
        let dataset = merge(prior, fresh, self.config.end_year, self.config.target_count);
        info!(records = dataset.len(), "run complete");
        dataset
    }

    async fn collect_pages(&mut self) -> Result<RunState, PipelineError> {
        let mut state = RunState::resume(self.load_checkpoint()?);
        if state.resume_offset() > 0 {
            info!(
                records = state.resume_offset(),
                path = %self.checkpoint.path().display(),
                "resuming from checkpoint"
            );
        }

        let target = self.config.target_count;
        let mut offset = state.resume_offset();
        while offset < target {
            let records = self.process_page(offset, &mut state).await?;

            state.enter(Phase::Checkpointing);
            self.checkpoint
                .append(records.as_slice())
                .map_err(PipelineError::Checkpoint)?;
            state.extend_fresh(records.into_vec());

            offset += PAGE_SIZE;
            if offset < target {
                self.config.page_delay.wait().await;
            }
        }
        Ok(state)
    }

    fn load_checkpoint(&self) -> Result<Vec<Record>, PipelineError> {
        match self.checkpoint.recover() {
            Ok(records) => Ok(records),
            Err(CheckpointError::Corrupt { path, reason }) => {
                warn!(
                    path = %path.display(),
                    reason = %reason,
                    "checkpoint unreadable, starting from the first page; file left in place"
                );
                Ok(Vec::new())
            }
            Err(e) => Err(PipelineError::Checkpoint(e)),
        }
    }

    #[instrument(skip(self, state))]
    async fn process_page(
        &mut self,
        offset: usize,
        state: &mut RunState,
    ) -> Result<RecordSet, PipelineError> {
        state.enter(Phase::FetchingPage);
        let url = self.query.page_url(offset);
        let page = match self.fetcher.fetch(&url, self.session.as_mut()).await {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(error = %e, "page fetch failed, continuing with no entries");
                None
            }
        };
        state.page_fetched();

        state.enter(Phase::Extracting);
        let entries = page
            .map(|page| parse_entries(&page.body, &page.url))
            .unwrap_or_default();
        let mut records = RecordSet::new();
        for entry in entries {
            let link = self.resolve_link(&entry).await;
            let (id, rank) = state.next_identity();
            records.push(entry.into_record(id, rank, link));
        }
        info!(entries = records.len(), "page extracted");

        if self.config.download_pdfs {
            state.enter(Phase::Downloading);
            self.download_page(&mut records).await?;
        }
        Ok(records)
    }

    async fn resolve_link(&self, entry: &ExtractedEntry) -> Option<String> {
        match &entry.link {
            LinkCandidate::Pdf(url) => Some(url.clone()),
            LinkCandidate::ExternalHtml(url) => {
                resolve_external_pdf(self.fetcher.external_client(), url).await
            }
            LinkCandidate::None => None,
        }
    }

    async fn download_page(&self, records: &mut RecordSet) -> Result<(), PipelineError> {
        let pdf_dir = self.config.pdf_dir();
        let mut jobs = Vec::new();
        let mut missing = Vec::new();
        for record in &*records {
            match &record.download_link {
                Some(url) if !url.is_empty() => jobs.push(DownloadJob {
                    id: record.id.clone(),
                    url: url.clone(),
                    dest: pdf_dir.join(format!("{}.pdf", record.id)),
                }),
                _ => missing.push(record.id.clone()),
            }
        }
        for id in &missing {
            records.set_status(id, DownloadStatus::FailedNoLink);
        }

        let outcomes = self
            .manager
            .download_batch(&self.downloads, jobs)
            .await
            .map_err(PipelineError::Engine)?;
        for outcome in &outcomes {
            records.apply_outcome(outcome);
        }
        Ok(())
    }
}
