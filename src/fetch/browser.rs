//! Chromium-backed [`RenderBackend`] via chromiumoxide.
//!
//! The browser is launched with a visible window so a person can solve a
//! challenge in it while the run waits.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::RenderError;
use super::render::{BODY_SELECTOR, RenderBackend, RenderLauncher};
use crate::user_agent::BROWSER_USER_AGENT;

/// Environment variable naming an explicit Chrome/Chromium executable.
pub const CHROME_PATH_ENV: &str = "SORTGS_CHROME_PATH";

const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Launches a headed Chromium.
#[derive(Debug, Clone, Default)]
pub struct ChromeLauncher {
    executable: Option<PathBuf>,
}

impl ChromeLauncher {
    /// Uses the executable from [`CHROME_PATH_ENV`] when set, otherwise lets
    /// chromiumoxide locate one.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            executable: std::env::var_os(CHROME_PATH_ENV).map(PathBuf::from),
        }
    }

    #[must_use]
    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: Some(executable.into()),
        }
    }
}

#[async_trait]
impl RenderLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderBackend>, RenderError> {
        let mut builder = BrowserConfig::builder()
            .with_head()
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"))
            .arg("--disable-infobars")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run")
            .arg("--no-default-browser-check");
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RenderError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // The handler drives the CDP connection and must be polled for the
        // browser to make progress.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler error");
                }
            }
            debug!("browser event handler task completed");
        });

        info!("browser launched");
        Ok(Box::new(ChromeBackend {
            browser,
            handler: handler_task,
            page: None,
        }))
    }
}

/// A running Chromium with at most one open page.
pub struct ChromeBackend {
    browser: Browser,
    handler: JoinHandle<()>,
    page: Option<Page>,
}

impl ChromeBackend {
    fn page(&self) -> Result<&Page, RenderError> {
        self.page
            .as_ref()
            .ok_or_else(|| RenderError::Protocol("no page loaded".to_string()))
    }

    async fn body(&self) -> Result<chromiumoxide::element::Element, RenderError> {
        self.page()?
            .find_element(BODY_SELECTOR)
            .await
            .map_err(|e| RenderError::Protocol(e.to_string()))
    }
}

#[async_trait]
impl RenderBackend for ChromeBackend {
    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        let navigation_error = |e: chromiumoxide::error::CdpError| RenderError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };
        match &self.page {
            Some(page) => {
                page.goto(url).await.map_err(navigation_error)?;
            }
            None => {
                let page = self.browser.new_page(url).await.map_err(navigation_error)?;
                self.page = Some(page);
            }
        }
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, RenderError> {
        let page = self.page()?;
        let start = Instant::now();
        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(ELEMENT_POLL_INTERVAL).await;
        }
    }

    async fn body_text(&mut self) -> Result<String, RenderError> {
        let body = self.body().await?;
        body.inner_text()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| RenderError::Protocol(e.to_string()))
    }

    async fn body_html(&mut self) -> Result<String, RenderError> {
        let body = self.body().await?;
        body.inner_html()
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| RenderError::Protocol(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.page = None;
        let closed = self
            .browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| RenderError::Protocol(e.to_string()));
        if let Err(e) = self.browser.wait().await {
            warn!(error = %e, "failed waiting for browser process to exit");
        }
        self.handler.abort();
        closed
    }
}

impl Drop for ChromeBackend {
    fn drop(&mut self) {
        // Browser::drop kills the process; the handler task must not outlive it.
        self.handler.abort();
    }
}
