//! Result page URL construction.

use crate::config::{RunConfig, current_year};

/// Builds result page URLs for one configured search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    base: String,
    term: String,
    filters: String,
}

impl SearchQuery {
    /// Derives base, encoded term and filters from the configuration.
    ///
    /// Debug mode points at the archived snapshot and drops all filters.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        let mut filters = String::new();
        if !config.debug {
            if let Some(start) = config.start_year {
                filters.push_str(&format!("&as_ylo={start}"));
            }
            if config.end_year != current_year() {
                filters.push_str(&format!("&as_yhi={}", config.end_year));
            }
            if !config.languages.is_empty() {
                filters.push_str("&lr=");
                filters.push_str(&format_language_filter(&config.languages));
            }
        }

        Self {
            base: config.effective_base_url().to_string(),
            term: encode_term(&config.query),
            filters,
        }
    }

    /// URL of the page whose first result is at `offset`.
    #[must_use]
    pub fn page_url(&self, offset: usize) -> String {
        format!(
            "{}/scholar?start={offset}&q={}&hl=en&as_sdt=0,5{}",
            self.base, self.term, self.filters
        )
    }
}

/// `lang_xx` codes joined by an encoded `|`.
#[must_use]
pub fn format_language_filter(codes: &[String]) -> String {
    codes
        .iter()
        .map(|code| format!("lang_{code}"))
        .collect::<Vec<_>>()
        .join("%7C")
}

/// Percent-encodes the term, with spaces as `+`.
fn encode_term(term: &str) -> String {
    urlencoding::encode(term).replace("%20", "+")
}
