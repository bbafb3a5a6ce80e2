//! Error types for directive processing.

use wv_config::ConfigError;
use wv_correlate::CorrelationError;
use wv_dom::DomError;
use wv_xhtml::{ParseError, TreeError};

use crate::host::HostError;
use crate::store::StoreError;

/// Error that aborts a whole page run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RunError {
    /// Localization bundle or configuration is unusable.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Storage markup of the page is not well formed.
    #[error("page source is not well-formed markup: {0}")]
    Parse(#[from] ParseError),

    /// The page's document exists but carries no metadata.
    #[error("document \"{document}\" exists but has no metadata")]
    MissingMetadata { document: String },

    /// The host returned no storage markup for the page.
    #[error("page source is unavailable")]
    MissingSource,

    /// The rendered page has no element matching the content selector.
    #[error("live content root `{0}` not found")]
    MissingContentRoot(String),

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("live document error: {0}")]
    Dom(#[from] DomError),
}

/// Error contained to a single directive.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DirectiveError {
    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error("failed to mount widget: {0}")]
    Render(#[from] DomError),

    #[error("failed to write directive back to the page source: {0}")]
    Writeback(#[from] TreeError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}
