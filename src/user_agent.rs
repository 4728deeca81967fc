//! Shared User-Agent strings for search and download HTTP clients.

/// Project URL for User-Agent identification on download requests.
const PROJECT_UA_URL: &str = "https://github.com/fierce/sortgs";

/// Browser User-Agent for result page requests.
///
/// The search source serves challenge pages far more often to clients that
/// identify as tools, so page fetches present as a desktop browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// User-Agent for result page requests.
#[must_use]
pub(crate) fn search_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}

/// User-Agent for PDF download requests (identifies the tool).
#[must_use]
pub(crate) fn download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sortgs/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}
