//! Errors that stop a run.

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::download::EngineError;
use crate::output::OutputError;

/// Fatal run errors.
///
/// Page fetch failures and per-record download failures are not fatal and
/// never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[source] ConfigError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("download manager error: {0}")]
    Engine(#[source] EngineError),

    #[error(transparent)]
    Checkpoint(CheckpointError),

    #[error(transparent)]
    Output(OutputError),
}
