//! End-to-end CLI tests for the sortgs binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use sortgs_core::{CheckpointStore, DownloadStatus, Record, record_id};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const RESULTS_PAGE: &str = r#"<html><body><div id="gs_res_ccl_mid">
    <div class="gs_r gs_or gs_scl">
        <h3 class="gs_rt"><a href="https://host.org/old">Older classic</a></h3>
        <div class="gs_a">A Author - Journal, 2000 - host.org</div>
        <a href="/scholar?cites=1">Cited by 250</a>
    </div>
    <div class="gs_r gs_or gs_scl">
        <h3 class="gs_rt"><a href="https://host.org/new">Recent hit</a></h3>
        <div class="gs_a">B Author - Conference, 2023 - host.org</div>
        <a href="/scholar?cites=2">Cited by 90</a>
    </div>
</div></body></html>"#;

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rank scholar search results"))
        .stdout(predicate::str::contains("--sortby"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sortgs"));
}

#[test]
fn test_binary_requires_search_term() {
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("<KW>"));
}

#[test]
fn test_binary_rejects_invalid_configuration() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.args(["deep learning", "--nresults", "0", "--no-browser", "--csvpath"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("number of results must be at least 1"));
}

#[test]
fn test_binary_rejects_unsupported_language() {
    let dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.args(["x", "--langfilter", "xx", "--no-browser", "--csvpath"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported language code 'xx'"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_binary_run_saves_sorted_csv_and_prints_summary() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/scholar"))
        .and(query_param("start", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output_dir = dir.path().to_path_buf();
    let base_url = server.uri();

    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("sortgs")
            .unwrap()
            .args([
                "neural nets",
                "--nresults",
                "10",
                "--sortby",
                "cit/year",
                "--endyear",
                "2024",
                "--min-delay",
                "0",
                "--max-delay",
                "0",
                "--no-browser",
                "--no-download",
                "--base-url",
                &base_url,
                "--csvpath",
            ])
            .arg(&output_dir)
            .assert()
    })
    .await
    .unwrap();

    let output = assert.success().get_output().clone();
    let stdout = String::from_utf8(output.stdout).unwrap();
    let recent = stdout.find("Recent hit").unwrap();
    let older = stdout.find("Older classic").unwrap();
    assert!(recent < older, "cit/year ordering not applied:\n{stdout}");

    let csv_path = dir.path().join("neural_nets.csv");
    let saved = std::fs::read_to_string(&csv_path).unwrap();
    let mut lines = saved.lines().skip(1);
    assert!(lines.next().unwrap().starts_with("paper_0001,"));
    assert!(lines.next().unwrap().starts_with("paper_0000,"));
    assert!(!dir.path().join("neural_nets.checkpoint.csv").exists());
}

#[test]
fn test_binary_finishes_from_complete_checkpoint_without_fetching() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("graph_nets.checkpoint.csv"));
    let records: Vec<Record> = (0..10)
        .map(|index| Record {
            id: record_id(index),
            title: format!("Stored paper {index}"),
            author: "A Author".to_string(),
            venue: "Journal".to_string(),
            publisher: "host.org".to_string(),
            source_link: format!("https://host.org/{index}"),
            citation_count: index as u64 * 10,
            year: 2015,
            download_link: None,
            download_status: DownloadStatus::FailedNoLink,
            rank: index + 1,
        })
        .collect();
    store.append(&records).unwrap();

    // Nothing listens here; any fetch would fail and leave the dataset short.
    let mut cmd = Command::cargo_bin("sortgs").unwrap();
    cmd.args([
        "graph nets",
        "--nresults",
        "10",
        "--no-browser",
        "--no-download",
        "--base-url",
        "http://127.0.0.1:9",
        "--csvpath",
    ])
    .arg(dir.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("Stored paper 9"));

    let saved = std::fs::read_to_string(dir.path().join("graph_nets.csv")).unwrap();
    assert_eq!(saved.lines().count(), 11);
    assert!(saved.lines().nth(1).unwrap().starts_with("paper_0009,"));
    assert!(!store.exists());
}
