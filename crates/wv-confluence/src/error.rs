//! Error types for Confluence access.

use wv_directives::HostError;

/// Error from Confluence API operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfluenceError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed")]
    HttpRequest(#[from] ureq::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// The page was returned without the requested body representation.
    #[error("page {page_id} has no {representation} body")]
    MissingBody {
        page_id: String,
        representation: &'static str,
    },
}

impl ConfluenceError {
    /// Whether the server refused access to the resource.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::HttpResponse { status: 401 | 403, .. })
    }
}

impl From<ConfluenceError> for HostError {
    fn from(err: ConfluenceError) -> Self {
        if err.is_forbidden() {
            Self::Permissions(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}
