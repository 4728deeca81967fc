//! Challenge-aware retrieval of result pages.
//!
//! A page is fetched with a plain GET first. When the body carries a
//! challenge phrase, the fetch escalates to the [`RenderSession`], which
//! renders the page in a browser and can wait for a person to clear the
//! challenge. If escalation is unavailable or fails, the direct content is
//! returned as-is and simply yields no entries downstream.

pub mod browser;
mod challenge;
mod error;
mod render;

use std::time::Duration;

use reqwest::{Client, ClientBuilder, redirect};
use tracing::{debug, info, instrument, warn};

pub use browser::{CHROME_PATH_ENV, ChromeLauncher};
pub use challenge::{CHALLENGE_PHRASES, ChallengeResolver, TerminalPrompt, is_challenge};
pub use error::{FetchError, RenderError};
pub use render::{BODY_SELECTOR, ElementWait, RenderBackend, RenderLauncher, RenderSession};

use crate::user_agent;

const SEARCH_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const SEARCH_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirects followed when resolving an external `[HTML]` full-text link.
pub const EXTERNAL_REDIRECT_LIMIT: usize = 3;

/// Where a page's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Direct,
    Rendered,
}

/// Content of one result page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    pub body: String,
    pub source: PageSource,
}

impl FetchedPage {
    /// True when the content still shows a challenge.
    #[must_use]
    pub fn is_challenge(&self) -> bool {
        is_challenge(&self.body)
    }
}

/// Fetches result pages with a browser-like client that keeps cookies
/// across pages.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    external: Client,
}

impl PageFetcher {
    /// Builds the search client and the external-link client.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = browser_like_client().build()?;
        let external = browser_like_client()
            .redirect(redirect::Policy::limited(EXTERNAL_REDIRECT_LIMIT))
            .build()?;
        Ok(Self { client, external })
    }

    /// Client for external `[HTML]` pages, capped at
    /// [`EXTERNAL_REDIRECT_LIMIT`] redirects.
    #[must_use]
    pub fn external_client(&self) -> &Client {
        &self.external
    }

    /// Fetches `url`, escalating to `session` when a challenge is detected.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure, or on an HTTP error status
    /// whose body is not a challenge page.
    #[instrument(skip(self, session), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        session: Option<&mut RenderSession>,
    ) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        let direct = FetchedPage {
            url: url.to_string(),
            body,
            source: PageSource::Direct,
        };

        if !direct.is_challenge() {
            if !status.is_success() {
                return Err(FetchError::http_status(url, status.as_u16()));
            }
            debug!(bytes = direct.body.len(), "fetched page directly");
            return Ok(direct);
        }

        info!(status = status.as_u16(), "challenge page detected");
        let Some(session) = session else {
            warn!("no rendering fallback configured, continuing with challenge content");
            return Ok(direct);
        };

        match session.render_clean(url).await {
            Ok(body) => Ok(FetchedPage {
                url: url.to_string(),
                body,
                source: PageSource::Rendered,
            }),
            Err(e) => {
                warn!(error = %e, "rendering fallback failed, continuing with direct content");
                Ok(direct)
            }
        }
    }
}

fn browser_like_client() -> ClientBuilder {
    Client::builder()
        .connect_timeout(SEARCH_CONNECT_TIMEOUT)
        .timeout(SEARCH_READ_TIMEOUT)
        .cookie_store(true)
        .gzip(true)
        .user_agent(user_agent::search_user_agent())
}
