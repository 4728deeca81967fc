//! Field extraction from result pages.
//!
//! A page is parsed synchronously into [`ExtractedEntry`] values (plain data,
//! no DOM handles), so nothing borrowed from the parser lives across an
//! `.await`. Each field is extracted independently: a field that cannot be
//! read gets its default and one warning, and never discards the entry.

mod fields;
mod link;

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

pub use fields::{
    CitationScan, extract_author, extract_citations, extract_publisher, extract_venue,
    extract_year,
};
pub use link::{HTML_VERSION_MARKER, LinkCandidate, find_pdf_anchor, resolve_external_pdf};

use crate::record::{
    AUTHOR_NOT_FOUND, DownloadStatus, PUBLISHER_NOT_FOUND, Record, SOURCE_NOT_FOUND_PREFIX,
    TITLE_NOT_FOUND, VENUE_NOT_FOUND,
};

#[allow(clippy::expect_used)]
static ENTRY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.gs_or").expect("entry selector is valid"));

#[allow(clippy::expect_used)]
static TITLE_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h3 a").expect("title selector is valid"));

#[allow(clippy::expect_used)]
static CITATION_LINE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.gs_a").expect("citation line selector is valid"));

/// Fields read from one result entry, before an id and rank are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntry {
    pub title: String,
    pub author: String,
    pub venue: String,
    pub publisher: String,
    pub source_link: String,
    pub citation_count: u64,
    pub year: i32,
    pub link: LinkCandidate,
}

impl ExtractedEntry {
    /// Builds the record with its identifier, rank and resolved download link.
    #[must_use]
    pub fn into_record(self, id: String, rank: usize, download_link: Option<String>) -> Record {
        Record {
            id,
            title: self.title,
            author: self.author,
            venue: self.venue,
            publisher: self.publisher,
            source_link: self.source_link,
            citation_count: self.citation_count,
            year: self.year,
            download_link,
            download_status: DownloadStatus::Pending,
            rank,
        }
    }
}

/// Parses every `div.gs_or` entry of a result page, in document order.
///
/// `page_url` feeds the source-link default.
#[must_use]
pub fn parse_entries(html: &str, page_url: &str) -> Vec<ExtractedEntry> {
    let document = Html::parse_document(html);
    let entries: Vec<ExtractedEntry> = document
        .select(&ENTRY)
        .map(|entry| extract_entry(entry, page_url))
        .collect();
    debug!(count = entries.len(), "parsed result entries");
    entries
}

fn extract_entry(entry: ElementRef<'_>, page_url: &str) -> ExtractedEntry {
    let title_link = entry.select(&TITLE_LINK).next();

    let title = title_link.map_or_else(
        || {
            warn!(field = "title", page_url, "title not found, using default");
            TITLE_NOT_FOUND.to_string()
        },
        |anchor| anchor.text().collect::<String>().trim().to_string(),
    );

    let source_link = match title_link.and_then(|anchor| anchor.value().attr("href")) {
        Some(href) => href.to_string(),
        None => {
            warn!(field = "source", title = %title, "source link not found, using default");
            format!("{SOURCE_NOT_FOUND_PREFIX}{page_url}")
        }
    };

    let citation_count = match extract_citations(&entry.html()) {
        CitationScan::Malformed => {
            warn!(field = "citations", title = %title, "citation count unreadable, using 0");
            0
        }
        scan => scan.value(),
    };

    let line = entry
        .select(&CITATION_LINE)
        .next()
        .map(|element| element.text().collect::<String>());

    let (author, publisher, venue, year) = match line.as_deref() {
        Some(line) => {
            let year = extract_year(line).unwrap_or_else(|| {
                warn!(field = "year", title = %title, "year not found, using 0");
                0
            });
            let venue = extract_venue(line).unwrap_or_else(|| {
                warn!(field = "venue", title = %title, "venue not found, using default");
                VENUE_NOT_FOUND.to_string()
            });
            (extract_author(line), extract_publisher(line), venue, year)
        }
        None => {
            warn!(title = %title, "citation line not found, author/venue/publisher/year defaulted");
            (
                AUTHOR_NOT_FOUND.to_string(),
                PUBLISHER_NOT_FOUND.to_string(),
                VENUE_NOT_FOUND.to_string(),
                0,
            )
        }
    };

    ExtractedEntry {
        title,
        author,
        venue,
        publisher,
        source_link,
        citation_count,
        year,
        link: LinkCandidate::from_entry(entry),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://scholar.google.com/scholar?start=0&q=x";

    fn page(entries: &[&str]) -> String {
        format!(
            "<html><body><div id=\"gs_res_ccl_mid\">{}</div></body></html>",
            entries.join("\n")
        )
    }

    const FULL_ENTRY: &str = r#"<div class="gs_r gs_or gs_scl">
        <div class="gs_ggs gs_fl"><a href="https://arxiv.org/pdf/1.pdf">[PDF] arxiv.org</a></div>
        <h3 class="gs_rt"><a href="https://nature.com/articles/nature14539">Deep learning</a></h3>
        <div class="gs_a">Y LeCun,&nbsp;Y Bengio, G Hinton - nature, 2015 - nature.com</div>
        <div class="gs_fl"><a href="/scholar?cites=5">Cited by 52000</a> <a>Related articles</a></div>
    </div>"#;

    #[test]
    fn test_full_entry_extracts_every_field() {
        let entries = parse_entries(&page(&[FULL_ENTRY]), PAGE_URL);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.title, "Deep learning");
        assert_eq!(entry.source_link, "https://nature.com/articles/nature14539");
        assert_eq!(entry.author, "Y LeCun, Y Bengio, G Hinton");
        assert_eq!(entry.venue, "nature");
        assert_eq!(entry.publisher, "nature.com");
        assert_eq!(entry.year, 2015);
        assert_eq!(entry.citation_count, 52000);
        assert_eq!(
            entry.link,
            LinkCandidate::Pdf("https://arxiv.org/pdf/1.pdf".to_string())
        );
    }

    #[test]
    fn test_missing_fields_default_independently() {
        let bare = r#"<div class="gs_or"><h3><span>[CITATION]</span> No link title</h3></div>"#;
        let entries = parse_entries(&page(&[bare, FULL_ENTRY]), PAGE_URL);
        assert_eq!(entries.len(), 2);

        let entry = &entries[0];
        assert_eq!(entry.title, TITLE_NOT_FOUND);
        assert_eq!(entry.source_link, format!("Look manually at: {PAGE_URL}"));
        assert_eq!(entry.author, AUTHOR_NOT_FOUND);
        assert_eq!(entry.publisher, PUBLISHER_NOT_FOUND);
        assert_eq!(entry.venue, VENUE_NOT_FOUND);
        assert_eq!(entry.year, 0);
        assert_eq!(entry.citation_count, 0);
        assert_eq!(entry.link, LinkCandidate::None);

        assert_eq!(entries[1].title, "Deep learning");
    }

    #[test]
    fn test_malformed_citation_and_year_default_to_zero() {
        let entry = r#"<div class="gs_or">
            <h3><a href="/x">Title</a></h3>
            <div class="gs_a">A Author - Some Venue - host.org</div>
            <a>Cited by </a>
        </div>"#;
        let entries = parse_entries(&page(&[entry]), PAGE_URL);
        assert_eq!(entries[0].citation_count, 0);
        assert_eq!(entries[0].year, 0);
        assert_eq!(entries[0].author, "A Author");
        assert_eq!(entries[0].publisher, "host.org");
    }

    #[test]
    fn test_challenge_page_has_no_entries() {
        let html = "<html><body>Our systems have detected unusual traffic from your computer network.</body></html>";
        assert!(parse_entries(html, PAGE_URL).is_empty());
    }

    #[test]
    fn test_into_record_starts_pending() {
        let entry = parse_entries(&page(&[FULL_ENTRY]), PAGE_URL).remove(0);
        let record = entry.into_record(
            "paper_0007".to_string(),
            8,
            Some("https://arxiv.org/pdf/1.pdf".to_string()),
        );
        assert_eq!(record.id, "paper_0007");
        assert_eq!(record.rank, 8);
        assert_eq!(record.download_status, DownloadStatus::Pending);
        assert_eq!(
            record.download_link.as_deref(),
            Some("https://arxiv.org/pdf/1.pdf")
        );
    }
}
