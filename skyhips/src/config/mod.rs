//! Engine configuration and the `config.ini` file.

mod engine;
mod file;
mod size;

pub use engine::{
    EngineConfig, DEFAULT_ALLSKY_ORDER, DEFAULT_CACHE_BUDGET_BYTES, DEFAULT_FADE_IN_MS,
    DEFAULT_MATERIALIZE_THREADS,
};
pub use file::ConfigFile;
pub use size::{format_size, parse_size};

use thiserror::Error;

/// Errors loading or saving configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Failed to write config: {0}")]
    Write(String),

    #[error("Invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    #[error("Invalid size: '{0}'")]
    InvalidSize(String),
}
