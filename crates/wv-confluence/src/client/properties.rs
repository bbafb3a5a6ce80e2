//! Content property operations for Confluence API.

use serde_json::Value;
use tracing::debug;

use super::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::types::ContentProperty;

impl ConfluenceClient {
    /// Value of content property `key` on a page, if set.
    pub fn get_property(&self, page_id: &str, key: &str) -> Result<Option<Value>, ConfluenceError> {
        let url = format!("{}/content/{}/property/{}", self.api_url(), page_id, key);

        let property: Option<ContentProperty> = self.get_json(&url)?;
        debug!(page_id, key, found = property.is_some(), "Content property");
        Ok(property.map(|property| property.value))
    }
}
