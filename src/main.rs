//! CLI entry point for sortgs.

use anyhow::{Context, Result};
use clap::Parser;
use sortgs_core::output::{summary_lines, terminal_width};
use sortgs_core::{ChromeLauncher, Pipeline, RenderSession, TerminalPrompt};
use tracing::{debug, info, warn};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = args.run_config();
    info!(
        query = %config.query,
        target = config.target_count,
        sort_by = %config.sort_by,
        languages = ?config.languages,
        start_year = ?config.start_year,
        end_year = config.end_year,
        save_csv = config.save_csv,
        output_dir = %config.output_dir.display(),
        debug = config.debug,
        downloads = config.download_pdfs,
        browser = config.browser_fallback,
        concurrency = config.concurrency,
        "sortgs starting"
    );
    if config.debug {
        warn!("debug mode: fetching an archived result page, filters are ignored");
    }

    let browser_fallback = config.browser_fallback;
    let mut pipeline = Pipeline::new(config).context("failed to set up run")?;
    if browser_fallback {
        let session = RenderSession::new(
            Box::new(ChromeLauncher::from_env()),
            Box::new(TerminalPrompt),
        );
        pipeline = pipeline.with_render_session(session);
    }

    let report = pipeline.run().await?;

    let stats = pipeline.download_manager().stats();
    info!(
        records = report.dataset.len(),
        resumed = report.resumed,
        pages = report.pages_fetched,
        downloaded = stats.succeeded(),
        download_failures = stats.failed(),
        retried = stats.retried(),
        "run finished"
    );
    if let Some(path) = &report.csv_path {
        info!(path = %path.display(), "results saved");
    }

    if !args.quiet {
        let view = report.dataset.sorted_by(report.sort_column.as_str());
        let mut lines = summary_lines(&view, terminal_width());
        if let Some(requested) = &report.sort_fallback {
            lines.insert(
                0,
                format!("Column '{requested}' not found, sorted by {} instead", view.column),
            );
        }
        for line in lines {
            println!("{line}");
        }
    }

    Ok(())
}
