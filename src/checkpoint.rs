//! Durable, append-per-page record of completed work.
//!
//! The checkpoint is a UTF-8 CSV with one row per record. Rows are appended
//! after every page and synced before the driver advances, so an interrupted
//! run resumes at the first page that was not fully written.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::record::{DownloadStatus, Record};

/// Column names, in file order.
pub const CHECKPOINT_HEADER: [&str; 11] = [
    "ID",
    "Author",
    "Title",
    "Citations",
    "Year",
    "Publisher",
    "Venue",
    "Source",
    "Download Link",
    "Download Status",
    "Rank",
];

/// Errors from reading or writing the checkpoint file.
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// File system error.
    #[error("checkpoint IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// CSV encoding failure while appending.
    #[error("failed to write checkpoint {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The file exists but cannot be trusted.
    #[error("corrupt checkpoint {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl CheckpointError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Author")]
    author: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Citations")]
    citations: u64,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Publisher")]
    publisher: String,
    #[serde(rename = "Venue")]
    venue: String,
    #[serde(rename = "Source")]
    source: String,
    #[serde(rename = "Download Link")]
    download_link: Option<String>,
    #[serde(rename = "Download Status")]
    download_status: DownloadStatus,
    #[serde(rename = "Rank")]
    rank: usize,
}

impl From<&Record> for CheckpointRow {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            author: record.author.clone(),
            title: record.title.clone(),
            citations: record.citation_count,
            year: record.year,
            publisher: record.publisher.clone(),
            venue: record.venue.clone(),
            source: record.source_link.clone(),
            download_link: record.download_link.clone(),
            download_status: record.download_status,
            rank: record.rank,
        }
    }
}

impl From<CheckpointRow> for Record {
    fn from(row: CheckpointRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            venue: row.venue,
            publisher: row.publisher,
            source_link: row.source,
            citation_count: row.citations,
            year: row.year,
            download_link: row.download_link.filter(|link| !link.is_empty()),
            download_status: row.download_status,
            rank: row.rank,
        }
    }
}

/// Complete rows plus, when a torn row follows them, the byte length they end at.
struct CheckpointContents {
    records: Vec<Record>,
    torn_at: Option<u64>,
}

impl CheckpointContents {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            torn_at: None,
        }
    }

    fn torn(records: Vec<Record>, complete_len: u64) -> Self {
        Self {
            records,
            torn_at: Some(complete_len),
        }
    }
}

/// Checkpoint file for one search.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Appends `records` and syncs the file before returning.
    ///
    /// The header is written only when the file is new or empty.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError`] if the file cannot be opened, written or synced.
    #[instrument(skip(self, records), fields(path = %self.path.display(), count = records.len()))]
    pub fn append(&self, records: &[Record]) -> Result<(), CheckpointError> {
        if records.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CheckpointError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CheckpointError::io(&self.path, e))?;
        let is_new = file
            .metadata()
            .map_err(|e| CheckpointError::io(&self.path, e))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        let mut ordered: Vec<&Record> = records.iter().collect();
        ordered.sort_by_key(|record| record.rank);
        for record in ordered {
            writer
                .serialize(CheckpointRow::from(record))
                .map_err(|e| CheckpointError::Write {
                    path: self.path.clone(),
                    source: e,
                })?;
        }
        writer
            .flush()
            .map_err(|e| CheckpointError::io(&self.path, e))?;
        let file: File = writer
            .into_inner()
            .map_err(|e| CheckpointError::io(&self.path, e.into_error()))?;
        file.sync_all()
            .map_err(|e| CheckpointError::io(&self.path, e))?;

        debug!(new_file = is_new, "checkpoint appended");
        Ok(())
    }

    /// Loads every checkpointed record in file order.
    ///
    /// A missing file is an empty checkpoint. A torn final row left by an
    /// interrupted [`append`](Self::append) (no trailing newline, or fewer
    /// fields than the header) is dropped with a warning; the complete rows
    /// before it are returned. The file itself is not modified.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Corrupt`] for a header mismatch, a malformed
    /// row before the last one, or an unknown status, and
    /// [`CheckpointError::Io`] if the file cannot be read.
    pub fn load(&self) -> Result<Vec<Record>, CheckpointError> {
        Ok(self.read()?.records)
    }

    /// Like [`load`](Self::load), but also truncates a torn final row so the
    /// next append starts on a clean line.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load), plus [`CheckpointError::Io`] if the file
    /// cannot be truncated.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn recover(&self) -> Result<Vec<Record>, CheckpointError> {
        let contents = self.read()?;
        if let Some(complete_len) = contents.torn_at {
            let file = OpenOptions::new()
                .write(true)
                .open(&self.path)
                .map_err(|e| CheckpointError::io(&self.path, e))?;
            file.set_len(complete_len)
                .map_err(|e| CheckpointError::io(&self.path, e))?;
            file.sync_all()
                .map_err(|e| CheckpointError::io(&self.path, e))?;
            info!(bytes = complete_len, "truncated torn checkpoint tail");
        }
        Ok(contents.records)
    }

    fn read(&self) -> Result<CheckpointContents, CheckpointError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CheckpointContents::empty()),
            Err(e) => return Err(CheckpointError::io(&self.path, e)),
        };
        if bytes.is_empty() {
            return Ok(CheckpointContents::empty());
        }
        let terminated = bytes.ends_with(b"\n");

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes.as_slice());
        let headers = reader
            .byte_headers()
            .map_err(|e| CheckpointError::corrupt(&self.path, e.to_string()))?
            .clone();
        if !headers.iter().eq(CHECKPOINT_HEADER.iter().map(|name| name.as_bytes())) {
            if !terminated && CHECKPOINT_HEADER.join(",").as_bytes().starts_with(&bytes) {
                warn!(path = %self.path.display(), "checkpoint header incomplete, treating as empty");
                return Ok(CheckpointContents::torn(Vec::new(), 0));
            }
            return Err(CheckpointError::corrupt(
                &self.path,
                format!(
                    "unexpected header: {}",
                    headers
                        .iter()
                        .map(String::from_utf8_lossy)
                        .collect::<Vec<_>>()
                        .join(",")
                ),
            ));
        }

        let rows: Vec<csv::ByteRecord> = reader
            .byte_records()
            .collect::<Result<_, _>>()
            .map_err(|e| CheckpointError::corrupt(&self.path, e.to_string()))?;
        if rows.is_empty() && !terminated {
            return Ok(CheckpointContents::torn(Vec::new(), 0));
        }

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            let is_last = index + 1 == rows.len();
            if is_last && (!terminated || row.len() < CHECKPOINT_HEADER.len()) {
                let complete_len = row.position().map_or(0, csv::Position::byte);
                warn!(
                    path = %self.path.display(),
                    row = index + 1,
                    kept = records.len(),
                    "dropping torn final checkpoint row"
                );
                return Ok(CheckpointContents::torn(records, complete_len));
            }
            if row.len() != CHECKPOINT_HEADER.len() {
                return Err(CheckpointError::corrupt(
                    &self.path,
                    format!(
                        "row {}: expected {} fields, found {}",
                        index + 1,
                        CHECKPOINT_HEADER.len(),
                        row.len()
                    ),
                ));
            }
            let parsed: CheckpointRow = row.deserialize(Some(&headers)).map_err(|e| {
                CheckpointError::corrupt(&self.path, format!("row {}: {e}", index + 1))
            })?;
            records.push(Record::from(parsed));
        }
        debug!(path = %self.path.display(), count = records.len(), "checkpoint loaded");
        Ok(CheckpointContents {
            records,
            torn_at: None,
        })
    }

    /// Deletes the checkpoint; a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] if an existing file cannot be removed.
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::io(&self.path, e)),
        }
    }
}
