//! CLI error types.

use wv_config::ConfigError;
use wv_directives::{HostError, RunError};
use wv_dom::DomError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid metadata JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Run(#[from] RunError),

    #[error("{0}")]
    Host(#[from] HostError),

    #[error("rendered page is not usable: {0}")]
    Dom(#[from] DomError),

    #[error("{0}")]
    Validation(String),
}
