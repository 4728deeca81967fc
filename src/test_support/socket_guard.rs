//! Skips mock-server tests where localhost sockets cannot be bound.
//!
//! Shared by the unit tests of `extract`, `download` and `fetch` and by the
//! integration suites under `tests/` (pipeline, download manager, fetcher,
//! CLI), which include this file through `tests/support`.

use std::net::TcpListener;
use std::panic::Location;

use wiremock::MockServer;

/// Environment variable that turns a skip into a failure.
pub const REQUIRE_SOCKET_TESTS_ENV: &str = "SORTGS_REQUIRE_SOCKET_TESTS";

#[must_use]
pub fn socket_tests_required() -> bool {
    std::env::var(REQUIRE_SOCKET_TESTS_ENV)
        .ok()
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

#[track_caller]
#[must_use]
pub fn should_skip_socket_bound_test() -> bool {
    if TcpListener::bind("127.0.0.1:0").is_ok() {
        return false;
    }

    let location = Location::caller();
    let message = format!(
        "[sortgs mock-server test] cannot bind localhost socket at {}:{}; \
         the mock search host and PDF host cannot start",
        location.file(),
        location.line()
    );
    assert!(
        !socket_tests_required(),
        "{message}. Set {REQUIRE_SOCKET_TESTS_ENV}=0 to allow skipping."
    );
    eprintln!("{message}. Skipping test. Set {REQUIRE_SOCKET_TESTS_ENV}=1 to fail instead.");
    true
}

/// Starts a mock server, or returns `None` after logging why the test skips.
pub async fn start_mock_server_or_skip() -> Option<MockServer> {
    if should_skip_socket_bound_test() {
        None
    } else {
        Some(MockServer::start().await)
    }
}
