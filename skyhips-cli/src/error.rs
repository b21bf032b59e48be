//! CLI error type.

use std::time::Duration;

use skyhips::config::ConfigError;
use skyhips::fetch::FetchError;
use skyhips::survey::{HipsListError, SurveyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("Invalid hipslist: {0}")]
    HipsList(#[from] HipsListError),

    #[error("Survey error: {0}")]
    Survey(#[from] SurveyError),

    #[error("Timed out after {0:?} waiting for {1}")]
    Timeout(Duration, String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgument(_) => 2,
            _ => 1,
        }
    }
}
