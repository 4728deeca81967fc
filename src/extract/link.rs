//! Download link discovery, including one-hop resolution of `[HTML]` links.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

/// Marker text the result source puts on links to an HTML full text.
pub const HTML_VERSION_MARKER: &str = "[HTML]";

#[allow(clippy::expect_used)]
static LINKS_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.gs_ggs.gs_fl").expect("links selector is valid"));

#[allow(clippy::expect_used)]
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

/// What the entry's download/links element points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkCandidate {
    /// Href that looks like a PDF.
    Pdf(String),
    /// External HTML full text that may itself link a PDF.
    ExternalHtml(String),
    None,
}

impl LinkCandidate {
    /// Inspects the first anchor of the entry's `div.gs_ggs.gs_fl` block.
    pub(crate) fn from_entry(entry: ElementRef<'_>) -> Self {
        let Some(block) = entry.select(&LINKS_BLOCK).next() else {
            return Self::None;
        };
        let Some(href) = block
            .select(&ANCHOR)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
        else {
            return Self::None;
        };

        if href.to_lowercase().contains("pdf") {
            return Self::Pdf(href.to_string());
        }
        if block.text().collect::<String>().contains(HTML_VERSION_MARKER) {
            return Self::ExternalHtml(href.to_string());
        }
        Self::None
    }
}

/// Returns the first anchor in `html` whose href contains `pdf`
/// (case-insensitive), resolved against `base`.
#[must_use]
pub fn find_pdf_anchor(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .find(|href| href.to_lowercase().contains("pdf"))
        .map(|href| match base.join(href) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => href.to_string(),
        })
}

/// Fetches an external HTML page once and scans it once for a PDF anchor.
///
/// Relative hrefs resolve against the page's final URL (after redirects).
/// The redirect budget is the client's; the pipeline passes
/// [`PageFetcher::external_client`](crate::fetch::PageFetcher::external_client).
/// Any failure yields `None`; the record then has no download link.
pub async fn resolve_external_pdf(client: &reqwest::Client, url: &str) -> Option<String> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(url, error = %e, "failed to fetch external HTML version");
            return None;
        }
    };
    if !response.status().is_success() {
        warn!(url, status = response.status().as_u16(), "external HTML version returned error status");
        return None;
    }
    let final_url = response.url().clone();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(url, error = %e, "failed to read external HTML version");
            return None;
        }
    };

    let found = find_pdf_anchor(&body, &final_url);
    debug!(url, found = found.is_some(), "scanned external HTML version");
    found
}
