//! Publication record types and download status definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::download::DownloadOutcome;

/// Default title when the entry heading cannot be read.
pub const TITLE_NOT_FOUND: &str = "Could not catch title";

/// Default author when the citation line cannot be read.
pub const AUTHOR_NOT_FOUND: &str = "Author not found";

/// Default venue when the citation line has no venue segment.
pub const VENUE_NOT_FOUND: &str = "Venue not found";

/// Default publisher when the citation line cannot be read.
pub const PUBLISHER_NOT_FOUND: &str = "Publisher not found";

/// Prefix of the default source link; the result page URL follows it.
pub const SOURCE_NOT_FOUND_PREFIX: &str = "Look manually at: ";

/// Download outcome of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    /// Not processed by the download manager yet.
    Pending,
    /// PDF written to the download directory.
    Succeeded,
    /// Entry had no downloadable document.
    FailedNoLink,
    /// Network failure, timeout, or HTTP error after the retry budget.
    FailedNetwork,
    /// Server returned something that is not a PDF.
    FailedNotPdf,
}

impl DownloadStatus {
    /// Returns the on-disk string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::FailedNoLink => "failed_no_link",
            Self::FailedNetwork => "failed_network",
            Self::FailedNotPdf => "failed_not_pdf",
        }
    }

    /// Returns true for terminal failure states.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::FailedNoLink | Self::FailedNetwork | Self::FailedNotPdf
        )
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DownloadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed_no_link" => Ok(Self::FailedNoLink),
            "failed_network" => Ok(Self::FailedNetwork),
            "failed_not_pdf" => Ok(Self::FailedNotPdf),
            _ => Err(format!("invalid download status: {s}")),
        }
    }
}

/// Formats the stable identifier for a global result position.
#[must_use]
pub fn record_id(global_index: usize) -> String {
    format!("paper_{global_index:04}")
}

/// One publication entry with its download outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Stable identifier, `paper_XXXX`.
    pub id: String,
    pub title: String,
    pub author: String,
    pub venue: String,
    pub publisher: String,
    /// Link to the publication landing page.
    pub source_link: String,
    pub citation_count: u64,
    /// Publication year, 0 when unknown.
    pub year: i32,
    /// Candidate PDF URL, if the entry offered one.
    pub download_link: Option<String>,
    pub download_status: DownloadStatus,
    /// 1-based position in fetch order.
    pub rank: usize,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Record {{ id: {}, rank: {}, citations: {}, status: {} }}",
            self.id, self.rank, self.citation_count, self.download_status
        )
    }
}

/// Ordered records of one run, updated by identifier.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    records: Vec<Record>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Sets the download status of the record with `id`.
    ///
    /// Returns false when no record carries that identifier.
    pub fn set_status(&mut self, id: &str, status: DownloadStatus) -> bool {
        match self.records.iter_mut().find(|record| record.id == id) {
            Some(record) => {
                record.download_status = status;
                true
            }
            None => false,
        }
    }

    /// Applies a download outcome to the record it names.
    pub fn apply_outcome(&mut self, outcome: &DownloadOutcome) -> bool {
        self.set_status(&outcome.id, outcome.status)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Record> {
        self.records
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
