//! Per-field parsers over an entry's raw markup and citation line.
//!
//! Every function here is pure. A `None` (or `Malformed`) return means the
//! field could not be read; the caller substitutes the default and logs once.

use std::sync::LazyLock;

use regex::Regex;

/// `Cited by ` followed by whatever digits come next (possibly none).
#[allow(clippy::expect_used)]
static CITED_BY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cited by (\d*)").expect("citation regex is valid") // Static pattern, safe to panic
});

/// Outcome of scanning for the citation marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationScan {
    /// Marker found with a count after it.
    Count(u64),
    /// No marker in the entry; the publication is uncited.
    Absent,
    /// Marker found but no parsable number follows it.
    Malformed,
}

impl CitationScan {
    /// Count to store on the record.
    #[must_use]
    pub fn value(self) -> u64 {
        match self {
            Self::Count(n) => n,
            Self::Absent | Self::Malformed => 0,
        }
    }
}

/// Scans raw entry markup for the last `Cited by N` marker.
#[must_use]
pub fn extract_citations(raw: &str) -> CitationScan {
    let Some(captures) = CITED_BY_PATTERN.captures_iter(raw).last() else {
        return CitationScan::Absent;
    };
    captures
        .get(1)
        .and_then(|digits| digits.as_str().parse::<u64>().ok())
        .map_or(CitationScan::Malformed, CitationScan::Count)
}

/// Reads the year from the four characters ending one before the last `-`.
///
/// `"Y LeCun - Nature, 2015 - nature.com"` yields 2015. Returns `None` when
/// the line has no `-` or those four characters are not all ASCII digits.
#[must_use]
pub fn extract_year(line: &str) -> Option<i32> {
    let chars: Vec<char> = line.chars().collect();
    let dash = chars.iter().rposition(|&c| c == '-')?;
    if dash < 5 {
        return None;
    }
    let token = &chars[dash - 5..dash - 1];
    if !token.iter().all(char::is_ascii_digit) {
        return None;
    }
    token.iter().collect::<String>().parse().ok()
}

/// Text before the first `" - "`, with non-breaking spaces normalized.
///
/// An empty line yields an empty author.
#[must_use]
pub fn extract_author(line: &str) -> String {
    let line = line.replace('\u{a0}', " ");
    line.split(" - ").next().unwrap_or_default().trim().to_string()
}

/// Last `-` separated segment of the citation line.
#[must_use]
pub fn extract_publisher(line: &str) -> String {
    line.rsplit('-').next().unwrap_or_default().trim().to_string()
}

/// Second-to-last `-` segment with its last comma-separated piece dropped.
///
/// `"A Author - Nature, 2015 - nature.com"` yields `"Nature"`.
#[must_use]
pub fn extract_venue(line: &str) -> Option<String> {
    let segments: Vec<&str> = line.split('-').collect();
    if segments.len() < 2 {
        return None;
    }
    let segment = segments[segments.len() - 2];
    let mut pieces: Vec<&str> = segment.split(',').collect();
    pieces.pop();
    Some(
        pieces
            .iter()
            .map(|piece| piece.trim())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string(),
    )
}
