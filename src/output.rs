//! Final CSV and console summary of a sorted dataset.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::aggregate::{RankedRecord, SortedView};
use crate::record::DownloadStatus;

/// Errors from writing the final dataset.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write output file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush output file {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(rename = "Author")]
    author: &'a str,
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Citations")]
    citations: u64,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Publisher")]
    publisher: &'a str,
    #[serde(rename = "Venue")]
    venue: &'a str,
    #[serde(rename = "Source")]
    source: &'a str,
    #[serde(rename = "Download Link")]
    download_link: Option<&'a str>,
    #[serde(rename = "Download Status")]
    download_status: DownloadStatus,
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "cit/year")]
    citations_per_year: u64,
}

impl<'a> From<&'a RankedRecord> for OutputRow<'a> {
    fn from(row: &'a RankedRecord) -> Self {
        let record = &row.record;
        Self {
            id: &record.id,
            author: &record.author,
            title: &record.title,
            citations: record.citation_count,
            year: record.year,
            publisher: &record.publisher,
            venue: &record.venue,
            source: &record.source_link,
            download_link: record.download_link.as_deref(),
            download_status: record.download_status,
            rank: record.rank,
            citations_per_year: row.citations_per_year,
        }
    }
}

/// Writes the sorted rows, header included, replacing any existing file.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory cannot be created or the file
/// cannot be written.
#[instrument(skip(view), fields(path = %path.display(), rows = view.len()))]
pub fn write_csv(view: &SortedView<'_>, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let write_error = |source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_error)?;
    for row in view.iter() {
        writer.serialize(OutputRow::from(row)).map_err(write_error)?;
    }
    writer.flush().map_err(|source| OutputError::Flush {
        path: path.to_path_buf(),
        source,
    })?;

    info!("dataset saved");
    Ok(())
}

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
#[must_use]
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 40)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending an ellipsis if truncated.
#[must_use]
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    match width {
        0 => String::new(),
        1 => "…".to_string(),
        _ => {
            let mut output: String = text.chars().take(width - 1).collect();
            output.push('…');
            output
        }
    }
}

const RANK_WIDTH: usize = 5;
const COUNT_WIDTH: usize = 9;
const YEAR_WIDTH: usize = 4;

/// Aligned summary table: rank, citations, cit/year, year and title.
///
/// Titles are cut to fit `width`.
#[must_use]
pub fn summary_lines(view: &SortedView<'_>, width: usize) -> Vec<String> {
    let fixed = RANK_WIDTH + 2 * COUNT_WIDTH + YEAR_WIDTH + 4;
    let title_width = width.saturating_sub(fixed).max(10);

    let mut lines = Vec::with_capacity(view.len() + 2);
    if let Some(requested) = &view.fallback {
        lines.push(format!(
            "Column '{requested}' not found, sorted by {} instead",
            view.column
        ));
    }
    lines.push(format!(
        "{:>RANK_WIDTH$} {:>COUNT_WIDTH$} {:>COUNT_WIDTH$} {:>YEAR_WIDTH$} Title",
        "Rank", "Citations", "cit/year", "Year"
    ));
    for row in view.iter() {
        let record = &row.record;
        lines.push(format!(
            "{:>RANK_WIDTH$} {:>COUNT_WIDTH$} {:>COUNT_WIDTH$} {:>YEAR_WIDTH$} {}",
            record.rank,
            record.citation_count,
            row.citations_per_year,
            record.year,
            truncate_to_width(&record.title, title_width)
        ));
    }
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregate::merge;
    use crate::record::{Record, record_id};
    use tempfile::TempDir;

    fn record(index: usize, citations: u64, title: &str) -> Record {
        Record {
            id: record_id(index),
            title: title.to_string(),
            author: "Doe".to_string(),
            venue: "Journal".to_string(),
            publisher: "pub.org".to_string(),
            source_link: "https://pub.org/x".to_string(),
            citation_count: citations,
            year: 2020,
            download_link: (index == 0).then(|| "https://pub.org/x.pdf".to_string()),
            download_status: DownloadStatus::Succeeded,
            rank: index + 1,
        }
    }

    #[test]
    fn test_write_csv_sorted_with_derived_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let dataset = merge(
            vec![record(0, 5, "Low"), record(1, 50, "High, with comma")],
            Vec::new(),
            2024,
            10,
        );
        write_csv(&dataset.sorted_by("Citations"), &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Author,Title,Citations,Year,Publisher,Venue,Source,Download Link,Download Status,Rank,cit/year"
        );
        assert_eq!(
            lines.next().unwrap(),
            "paper_0001,Doe,\"High, with comma\",50,2020,pub.org,Journal,https://pub.org/x,,succeeded,2,10"
        );
        assert!(lines.next().unwrap().starts_with("paper_0000,"));
    }

    #[test]
    fn test_summary_lines_report_fallback_and_truncate_titles() {
        let long_title = "t".repeat(200);
        let dataset = merge(vec![record(0, 5, &long_title)], Vec::new(), 2024, 10);
        let lines = summary_lines(&dataset.sorted_by("Nope"), 60);

        assert!(lines[0].contains("'Nope'"));
        assert!(lines[1].contains("Citations"));
        assert!(lines[2].ends_with('…'));
        assert!(lines[2].chars().count() <= 60);
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("abc", 5), "abc");
        assert_eq!(truncate_to_width("abcdef", 4), "abc…");
        assert_eq!(truncate_to_width("abc", 1), "…");
        assert_eq!(truncate_to_width("abc", 0), "");
    }
}
