//! Rendering fallback used when a direct fetch returns a challenge page.
//!
//! [`RenderSession`] owns at most one browser for the whole run. It is
//! launched on first use, reused for every later challenge, and released by
//! an explicit [`RenderSession::shutdown`] call.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::challenge::{ChallengeResolver, is_challenge};
use super::error::RenderError;
use crate::config::DelayRange;

/// Element whose presence marks a rendered page as loaded.
pub const BODY_SELECTOR: &str = "body";

const DEFAULT_WAIT_ATTEMPTS: u32 = 5;
const DEFAULT_WAIT_PER_ATTEMPT: Duration = Duration::from_secs(10);

/// One live browser page.
#[async_trait]
pub trait RenderBackend: Send {
    /// Navigates to `url`.
    async fn load(&mut self, url: &str) -> Result<(), RenderError>;

    /// Waits up to `timeout` for `selector`; `Ok(false)` when it never appeared.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError>;

    /// Visible text of the body element.
    async fn body_text(&mut self) -> Result<String, RenderError>;

    /// Inner HTML of the body element.
    async fn body_html(&mut self) -> Result<String, RenderError>;

    /// Closes the browser and releases its process.
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Starts a [`RenderBackend`].
#[async_trait]
pub trait RenderLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn RenderBackend>, RenderError>;
}

/// Bounded wait for the body element: `attempts` waits of `per_attempt`,
/// separated by a random pause.
#[derive(Debug, Clone)]
pub struct ElementWait {
    pub attempts: u32,
    pub per_attempt: Duration,
    pub pause: DelayRange,
}

impl Default for ElementWait {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_WAIT_ATTEMPTS,
            per_attempt: DEFAULT_WAIT_PER_ATTEMPT,
            pause: DelayRange::default(),
        }
    }
}

/// Lazily-launched browser session plus the manual resume signal.
pub struct RenderSession {
    launcher: Box<dyn RenderLauncher>,
    resolver: Box<dyn ChallengeResolver>,
    backend: Option<Box<dyn RenderBackend>>,
    wait: ElementWait,
    launches: u32,
}

impl fmt::Debug for RenderSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderSession")
            .field("launched", &self.backend.is_some())
            .field("launches", &self.launches)
            .field("wait", &self.wait)
            .finish_non_exhaustive()
    }
}

impl RenderSession {
    #[must_use]
    pub fn new(launcher: Box<dyn RenderLauncher>, resolver: Box<dyn ChallengeResolver>) -> Self {
        Self {
            launcher,
            resolver,
            backend: None,
            wait: ElementWait::default(),
            launches: 0,
        }
    }

    #[must_use]
    pub fn with_element_wait(mut self, wait: ElementWait) -> Self {
        self.wait = wait;
        self
    }

    /// True while a browser is running.
    #[must_use]
    pub fn is_launched(&self) -> bool {
        self.backend.is_some()
    }

    /// Number of browsers launched over the session's lifetime.
    #[must_use]
    pub fn launches(&self) -> u32 {
        self.launches
    }

    /// Loads `url` in the browser until it renders without a challenge.
    ///
    /// Every time the rendered text still shows a challenge, blocks on the
    /// resolver and then checks again. Returns the body's inner HTML.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the browser cannot be launched, navigation
    /// fails, the body never appears, or the resolver fails.
    #[instrument(skip(self))]
    pub async fn render_clean(&mut self, url: &str) -> Result<String, RenderError> {
        if self.backend.is_none() {
            info!("launching browser for challenge handling");
            self.backend = Some(self.launcher.launch().await?);
            self.launches += 1;
        }
        let Self {
            backend,
            resolver,
            wait,
            ..
        } = self;
        let Some(backend) = backend.as_mut() else {
            return Err(RenderError::Launch("browser not available".to_string()));
        };

        backend.load(url).await?;

        let mut rounds = 0u32;
        loop {
            wait_for_body(backend.as_mut(), wait).await?;
            let text = backend.body_text().await?;
            if !is_challenge(&text) {
                debug!(rounds, "rendered page is clean");
                return backend.body_html().await;
            }
            rounds += 1;
            warn!(rounds, "challenge still present, waiting for manual resolution");
            resolver.wait_for_resolution(url).await?;
        }
    }

    /// Closes the browser if one was launched. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            match backend.close().await {
                Ok(()) => info!("browser session closed"),
                Err(e) => warn!(error = %e, "failed to close browser session cleanly"),
            }
        }
    }
}

/// Polls for the body element with an explicit attempt counter.
async fn wait_for_body(
    backend: &mut dyn RenderBackend,
    wait: &ElementWait,
) -> Result<(), RenderError> {
    let attempts = wait.attempts.max(1);
    for attempt in 1..=attempts {
        match backend
            .wait_for_element(BODY_SELECTOR, wait.per_attempt)
            .await
        {
            Ok(true) => return Ok(()),
            Ok(false) => debug!(attempt, "body not present yet"),
            Err(e) => debug!(attempt, error = %e, "body lookup failed"),
        }
        if attempt < attempts {
            wait.pause.wait().await;
        }
    }
    Err(RenderError::ElementTimeout {
        selector: BODY_SELECTOR.to_string(),
        attempts,
        per_attempt: wait.per_attempt,
    })
}
