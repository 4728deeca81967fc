//! Driver phases and per-run state.

use std::fmt;

use tracing::debug;

use crate::record::{Record, RecordSet, record_id};

/// Step the driver is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resuming,
    FetchingPage,
    Extracting,
    Downloading,
    Checkpointing,
    Done,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resuming => "resuming",
            Self::FetchingPage => "fetching_page",
            Self::Extracting => "extracting",
            Self::Downloading => "downloading",
            Self::Checkpointing => "checkpointing",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State owned by the driver for one invocation.
#[derive(Debug)]
pub struct RunState {
    phase: Phase,
    /// Records found in a well-formed checkpoint.
    prior: Vec<Record>,
    /// Offset of the first page this run fetches.
    resume_offset: usize,
    next_index: usize,
    /// Records produced by this run, in extraction order.
    fresh: RecordSet,
    pages_fetched: usize,
}

impl RunState {
    /// State resuming after `prior`; identifiers continue from its length.
    #[must_use]
    pub fn resume(prior: Vec<Record>) -> Self {
        let resume_offset = prior.len();
        Self {
            phase: Phase::Resuming,
            prior,
            resume_offset,
            next_index: resume_offset,
            fresh: RecordSet::new(),
            pages_fetched: 0,
        }
    }

    pub fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn resume_offset(&self) -> usize {
        self.resume_offset
    }

    /// Hands out the next `(id, rank)` pair.
    pub fn next_identity(&mut self) -> (String, usize) {
        let index = self.next_index;
        self.next_index += 1;
        (record_id(index), index + 1)
    }

    pub fn page_fetched(&mut self) {
        self.pages_fetched += 1;
    }

    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn extend_fresh(&mut self, records: Vec<Record>) {
        for record in records {
            self.fresh.push(record);
        }
    }

    #[must_use]
    pub fn fresh(&self) -> &RecordSet {
        &self.fresh
    }

    /// Splits into checkpointed and fresh records.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Record>, Vec<Record>) {
        (self.prior, self.fresh.into_vec())
    }
}
