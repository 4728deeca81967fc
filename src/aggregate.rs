//! Merging checkpointed and fresh records into the final ranked dataset.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::record::Record;

/// Name of the derived citations-per-year column.
pub const CIT_PER_YEAR_COLUMN: &str = "cit/year";

/// Sortable output columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    Author,
    Title,
    Citations,
    Year,
    Publisher,
    Venue,
    Source,
    DownloadLink,
    DownloadStatus,
    Rank,
    CitPerYear,
}

impl SortColumn {
    /// All columns in output order.
    pub const ALL: [Self; 12] = [
        Self::Id,
        Self::Author,
        Self::Title,
        Self::Citations,
        Self::Year,
        Self::Publisher,
        Self::Venue,
        Self::Source,
        Self::DownloadLink,
        Self::DownloadStatus,
        Self::Rank,
        Self::CitPerYear,
    ];

    /// Column header as written to the output file.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Author => "Author",
            Self::Title => "Title",
            Self::Citations => "Citations",
            Self::Year => "Year",
            Self::Publisher => "Publisher",
            Self::Venue => "Venue",
            Self::Source => "Source",
            Self::DownloadLink => "Download Link",
            Self::DownloadStatus => "Download Status",
            Self::Rank => "Rank",
            Self::CitPerYear => CIT_PER_YEAR_COLUMN,
        }
    }

    fn compare(self, a: &RankedRecord, b: &RankedRecord) -> Ordering {
        let (x, y) = (&a.record, &b.record);
        match self {
            Self::Id => x.id.cmp(&y.id),
            Self::Author => x.author.cmp(&y.author),
            Self::Title => x.title.cmp(&y.title),
            Self::Citations => x.citation_count.cmp(&y.citation_count),
            Self::Year => x.year.cmp(&y.year),
            Self::Publisher => x.publisher.cmp(&y.publisher),
            Self::Venue => x.venue.cmp(&y.venue),
            Self::Source => x.source_link.cmp(&y.source_link),
            Self::DownloadLink => x.download_link.cmp(&y.download_link),
            Self::DownloadStatus => x.download_status.as_str().cmp(y.download_status.as_str()),
            Self::Rank => x.rank.cmp(&y.rank),
            Self::CitPerYear => a.citations_per_year.cmp(&b.citations_per_year),
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| format!("unknown column: {s}"))
    }
}

/// Citations per year since publication, rounded half to even.
///
/// Years after `end_year` are clipped to it, so the divisor is at least 1.
/// An unknown year (0) spreads the citations over every year up to `end_year`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn citations_per_year(citations: u64, year: i32, end_year: i32) -> u64 {
    let years = i64::from(end_year) + 1 - i64::from(year.min(end_year));
    let years = years.max(1);
    (citations as f64 / years as f64).round_ties_even() as u64
}

/// A record with its derived metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedRecord {
    pub record: Record,
    pub citations_per_year: u64,
}

/// Final dataset, in fetch order.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<RankedRecord>,
}

/// Dataset rows sorted by one column, descending.
#[derive(Debug)]
pub struct SortedView<'a> {
    /// Column actually used.
    pub column: SortColumn,
    /// Requested column name when it was unknown and `Citations` was used instead.
    pub fallback: Option<String>,
    rows: Vec<&'a RankedRecord>,
}

impl<'a> SortedView<'a> {
    #[must_use]
    pub fn rows(&self) -> &[&'a RankedRecord] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a RankedRecord> + '_ {
        self.rows.iter().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Merges checkpointed and fresh records.
///
/// Checkpointed records come first, each group in rank order. The result is
/// truncated to `target` and ranks are reassigned 1..n.
#[must_use]
pub fn merge(prior: Vec<Record>, fresh: Vec<Record>, end_year: i32, target: usize) -> Dataset {
    let mut prior = prior;
    let mut fresh = fresh;
    prior.sort_by_key(|record| record.rank);
    fresh.sort_by_key(|record| record.rank);

    let rows: Vec<RankedRecord> = prior
        .into_iter()
        .chain(fresh)
        .take(target)
        .enumerate()
        .map(|(index, mut record)| {
            record.rank = index + 1;
            let citations_per_year =
                citations_per_year(record.citation_count, record.year, end_year);
            RankedRecord {
                record,
                citations_per_year,
            }
        })
        .collect();

    debug!(rows = rows.len(), target, "dataset merged");
    Dataset { rows }
}

impl Dataset {
    #[must_use]
    pub fn rows(&self) -> &[RankedRecord] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorts by the named column, descending and stable.
    ///
    /// An unknown name falls back to `Citations`; the requested name is kept
    /// in [`SortedView::fallback`] and a warning is logged.
    #[must_use]
    pub fn sorted_by(&self, column: &str) -> SortedView<'_> {
        let (sort_column, fallback) = match column.parse::<SortColumn>() {
            Ok(parsed) => (parsed, None),
            Err(_) => {
                warn!(
                    requested = column,
                    "column name to be sorted not found, sorting by the number of citations"
                );
                (SortColumn::Citations, Some(column.to_string()))
            }
        };

        let mut rows: Vec<&RankedRecord> = self.rows.iter().collect();
        rows.sort_by(|a, b| sort_column.compare(b, a));

        SortedView {
            column: sort_column,
            fallback,
            rows,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::record::{DownloadStatus, record_id};

    fn record(index: usize, citations: u64, year: i32) -> Record {
        Record {
            id: record_id(index),
            title: format!("Title {index}"),
            author: "Author".to_string(),
            venue: "Venue".to_string(),
            publisher: "host".to_string(),
            source_link: "https://host/x".to_string(),
            citation_count: citations,
            year,
            download_link: None,
            download_status: DownloadStatus::FailedNoLink,
            rank: index + 1,
        }
    }

    #[test]
    fn test_citations_per_year_reference_value() {
        assert_eq!(citations_per_year(50, 2020, 2024), 10);
    }

    #[test]
    fn test_citations_per_year_clips_future_years() {
        assert_eq!(citations_per_year(7, 2030, 2024), 7);
        assert_eq!(citations_per_year(7, 2024, 2024), 7);
    }

    #[test]
    fn test_citations_per_year_rounds_half_to_even() {
        // 5 / 2 = 2.5 -> 2, 7 / 2 = 3.5 -> 4
        assert_eq!(citations_per_year(5, 2023, 2024), 2);
        assert_eq!(citations_per_year(7, 2023, 2024), 4);
    }

    #[test]
    fn test_citations_per_year_unknown_year() {
        assert_eq!(citations_per_year(2025, 0, 2024), 1);
    }

    #[test]
    fn test_merge_orders_prior_first_truncates_and_reranks() {
        let prior = vec![record(1, 5, 2020), record(0, 9, 2019)];
        let fresh = vec![record(2, 1, 2021), record(3, 2, 2022)];
        let dataset = merge(prior, fresh, 2024, 3);

        let ids: Vec<&str> = dataset.rows().iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["paper_0000", "paper_0001", "paper_0002"]);
        let ranks: Vec<usize> = dataset.rows().iter().map(|r| r.record.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_sorted_by_citations_descending_and_stable() {
        let dataset = merge(
            vec![record(0, 3, 2020), record(1, 10, 2020), record(2, 3, 2020)],
            Vec::new(),
            2024,
            10,
        );
        let view = dataset.sorted_by("Citations");
        assert!(view.fallback.is_none());
        let ids: Vec<&str> = view.iter().map(|r| r.record.id.as_str()).collect();
        assert_eq!(ids, vec!["paper_0001", "paper_0000", "paper_0002"]);
    }

    #[test]
    fn test_sorted_by_cit_per_year() {
        let dataset = merge(
            vec![record(0, 100, 2000), record(1, 50, 2023)],
            Vec::new(),
            2024,
            10,
        );
        let view = dataset.sorted_by("cit/year");
        assert_eq!(view.column, SortColumn::CitPerYear);
        assert_eq!(view.rows()[0].record.id, "paper_0001");
    }

    #[test]
    fn test_unknown_column_falls_back_to_citations() {
        let dataset = merge(
            vec![record(0, 1, 2020), record(1, 2, 2020)],
            Vec::new(),
            2024,
            10,
        );
        let view = dataset.sorted_by("Impact");
        assert_eq!(view.column, SortColumn::Citations);
        assert_eq!(view.fallback.as_deref(), Some("Impact"));
        assert_eq!(view.rows()[0].record.id, "paper_0001");
    }

    #[test]
    fn test_sort_column_parses_output_names() {
        assert_eq!("Download Status".parse::<SortColumn>(), Ok(SortColumn::DownloadStatus));
        assert!("citations".parse::<SortColumn>().is_err());
    }
}
