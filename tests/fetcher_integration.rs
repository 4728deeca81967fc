//! Integration tests for challenge-aware page fetching.
//!
//! The browser is replaced by a scripted backend so escalation can be
//! observed without launching Chromium.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use sortgs_core::extract::resolve_external_pdf;
use sortgs_core::fetch::{EXTERNAL_REDIRECT_LIMIT, ElementWait};
use sortgs_core::{
    ChallengeResolver, DelayRange, FetchError, PageFetcher, PageSource, Pipeline, RenderBackend,
    RenderError, RenderLauncher, RenderSession, RunConfig,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

const CHALLENGE_PAGE: &str = "<html><body><p>Our systems have detected unusual traffic from your \
     computer network.</p><form id=\"captcha-form\"></form></body></html>";

const RENDERED_RESULTS: &str = r#"<div id="gs_res_ccl_mid">
    <div class="gs_r gs_or gs_scl">
        <h3 class="gs_rt"><a href="https://host.org/a">Rendered paper</a></h3>
        <div class="gs_a">C Author - Proceedings, 2019 - host.org</div>
        <a href="/scholar?cites=1">Cited by 42</a>
    </div>
</div>"#;

#[derive(Default)]
struct Counters {
    launches: AtomicUsize,
    loads: AtomicUsize,
    resolutions: AtomicUsize,
    closes: AtomicUsize,
}

/// Shows the challenge text `challenge_rounds` times, then clean results.
struct FakeBrowser {
    counters: Arc<Counters>,
    challenge_rounds: usize,
    reads: usize,
}

#[async_trait]
impl RenderBackend for FakeBrowser {
    async fn load(&mut self, _url: &str) -> Result<(), RenderError> {
        self.counters.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        _selector: &str,
        _timeout: Duration,
    ) -> Result<bool, RenderError> {
        Ok(true)
    }

    async fn body_text(&mut self) -> Result<String, RenderError> {
        self.reads += 1;
        if self.reads <= self.challenge_rounds {
            Ok("Please show you're not a robot".to_string())
        } else {
            Ok("Rendered paper C Author".to_string())
        }
    }

    async fn body_html(&mut self) -> Result<String, RenderError> {
        Ok(RENDERED_RESULTS.to_string())
    }

    async fn close(&mut self) -> Result<(), RenderError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeLauncher {
    counters: Arc<Counters>,
    challenge_rounds: usize,
    fail: bool,
}

#[async_trait]
impl RenderLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn RenderBackend>, RenderError> {
        if self.fail {
            return Err(RenderError::Launch("no browser installed".to_string()));
        }
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeBrowser {
            counters: Arc::clone(&self.counters),
            challenge_rounds: self.challenge_rounds,
            reads: 0,
        }))
    }
}

struct CountingResolver(Arc<Counters>);

#[async_trait]
impl ChallengeResolver for CountingResolver {
    async fn wait_for_resolution(&self, _url: &str) -> Result<(), RenderError> {
        self.0.resolutions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn fake_session(challenge_rounds: usize, fail: bool) -> (RenderSession, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let session = RenderSession::new(
        Box::new(FakeLauncher {
            counters: Arc::clone(&counters),
            challenge_rounds,
            fail,
        }),
        Box::new(CountingResolver(Arc::clone(&counters))),
    )
    .with_element_wait(ElementWait {
        attempts: 2,
        per_attempt: Duration::from_millis(1),
        pause: DelayRange::none(),
    });
    (session, counters)
}

#[tokio::test]
async fn test_clean_page_is_returned_directly() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RENDERED_RESULTS))
        .mount(&server)
        .await;

    let (mut session, counters) = fake_session(0, false);
    let fetcher = PageFetcher::new().unwrap();
    let url = format!("{}/scholar?start=0", server.uri());
    let page = fetcher.fetch(&url, Some(&mut session)).await.unwrap();

    assert_eq!(page.source, PageSource::Direct);
    assert!(!page.is_challenge());
    assert_eq!(counters.launches.load(Ordering::SeqCst), 0);
    assert!(!session.is_launched());
}

#[tokio::test]
async fn test_challenge_escalates_and_waits_for_resolution() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(429).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let (mut session, counters) = fake_session(2, false);
    let fetcher = PageFetcher::new().unwrap();
    let url = format!("{}/scholar?start=0", server.uri());

    let page = fetcher.fetch(&url, Some(&mut session)).await.unwrap();
    assert_eq!(page.source, PageSource::Rendered);
    assert_eq!(page.body, RENDERED_RESULTS);
    assert_eq!(counters.resolutions.load(Ordering::SeqCst), 2);

    // A second challenge reuses the running browser.
    fetcher.fetch(&url, Some(&mut session)).await.unwrap();
    assert_eq!(counters.launches.load(Ordering::SeqCst), 1);
    assert_eq!(counters.loads.load(Ordering::SeqCst), 2);

    session.shutdown().await;
    session.shutdown().await;
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_escalation_returns_direct_content() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE))
        .mount(&server)
        .await;

    let (mut session, _) = fake_session(0, true);
    let fetcher = PageFetcher::new().unwrap();
    let url = format!("{}/scholar?start=0", server.uri());
    let page = fetcher.fetch(&url, Some(&mut session)).await.unwrap();

    assert_eq!(page.source, PageSource::Direct);
    assert!(page.is_challenge());
}

#[tokio::test]
async fn test_error_status_without_challenge_is_fetch_error() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let fetcher = PageFetcher::new().unwrap();
    let url = format!("{}/scholar?start=0", server.uri());
    let err = fetcher.fetch(&url, None).await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }), "got {err:?}");
}

#[tokio::test]
async fn test_pipeline_extracts_rendered_page_and_closes_browser() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CHALLENGE_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = RunConfig::new("rendered");
    config.base_url = Some(server.uri());
    config.output_dir = dir.path().to_path_buf();
    config.target_count = 10;
    config.page_delay = DelayRange::none();

    let (session, counters) = fake_session(1, false);
    let mut pipeline = Pipeline::new(config).unwrap().with_render_session(session);
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.dataset.len(), 1);
    let record = &report.dataset.rows()[0].record;
    assert_eq!(record.title, "Rendered paper");
    assert_eq!(record.citation_count, 42);
    assert_eq!(record.year, 2019);
    assert_eq!(counters.resolutions.load(Ordering::SeqCst), 1);
    assert_eq!(counters.closes.load(Ordering::SeqCst), 1);
}

/// Mounts `/hop/1` -> `/hop/2` -> ... -> `/hop/{hops}` -> `/fulltext/`.
async fn mount_redirect_chain(server: &MockServer, hops: usize, landing_hits: u64) {
    for hop in 1..=hops {
        let next = if hop == hops {
            "/fulltext/".to_string()
        } else {
            format!("/hop/{}", hop + 1)
        };
        Mock::given(method("GET"))
            .and(path(format!("/hop/{hop}")))
            .respond_with(ResponseTemplate::new(302).insert_header("location", next.as_str()))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/fulltext/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"<a href="paper.pdf">PDF</a>"#),
        )
        .expect(landing_hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_external_link_follows_short_redirect_chain() {
    let server = require_mock_server!();
    mount_redirect_chain(&server, 2, 1).await;

    let fetcher = PageFetcher::new().unwrap();
    let found =
        resolve_external_pdf(fetcher.external_client(), &format!("{}/hop/1", server.uri())).await;
    assert_eq!(found, Some(format!("{}/fulltext/paper.pdf", server.uri())));
}

#[tokio::test]
async fn test_external_link_redirects_are_bounded() {
    let server = require_mock_server!();
    mount_redirect_chain(&server, EXTERNAL_REDIRECT_LIMIT + 5, 0).await;

    let fetcher = PageFetcher::new().unwrap();
    let found =
        resolve_external_pdf(fetcher.external_client(), &format!("{}/hop/1", server.uri())).await;
    assert_eq!(found, None);
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests.len() <= EXTERNAL_REDIRECT_LIMIT + 1,
        "followed {} requests",
        requests.len()
    );
}
