//! Page operations for Confluence API.

use tracing::info;

use super::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::types::Page;

/// Expansions needed to run directives over a page.
const PAGE_EXPAND: &str = "body.storage,body.view,space,ancestors";

impl ConfluenceClient {
    /// Get a page with its storage and view bodies, space and ancestors.
    ///
    /// # Errors
    ///
    /// A missing page is reported as a 404 [`ConfluenceError::HttpResponse`].
    pub fn get_page(&self, page_id: &str) -> Result<Page, ConfluenceError> {
        let url = format!(
            "{}/content/{}?expand={}",
            self.api_url(),
            page_id,
            PAGE_EXPAND
        );

        info!("Getting page {}", page_id);

        self.get_json(&url)?.ok_or_else(|| ConfluenceError::HttpResponse {
            status: 404,
            body: format!("page {page_id} not found"),
        })
    }
}
