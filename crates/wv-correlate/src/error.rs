//! Correlation errors.

use wv_dom::DomError;
use wv_xhtml::QueryError;

/// Error produced while correlating a descriptor.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CorrelationError {
    /// Storage and live queries disagree on the number of matches.
    #[error(
        "storage query matched {nodes} node(s) but live selector matched {elements} element(s)"
    )]
    Mismatch {
        nodes: usize,
        elements: usize,
        storage: String,
        live: String,
    },

    #[error("invalid storage query `{query}`")]
    Storage {
        query: String,
        #[source]
        source: QueryError,
    },

    #[error("invalid live selector `{selector}`")]
    Live {
        selector: String,
        #[source]
        source: DomError,
    },
}

impl CorrelationError {
    /// Whether this error is the count-parity guard rather than a malformed query.
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}
