//! Confluence REST API client.
//!
//! Provides a sync HTTP client for the Confluence Server/Data Center REST API
//! with personal access token authentication.

mod pages;
mod properties;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;
use ureq::Agent;
use wv_config::ConfluenceConfig;

use crate::error::ConfluenceError;

/// Default HTTP timeout in seconds.
const DEFAULT_TIMEOUT: u64 = 30;

/// Confluence REST API client.
pub struct ConfluenceClient {
    agent: Agent,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for ConfluenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluenceClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ConfluenceClient {
    /// Create a client for `base_url` authenticating with a bearer `token`.
    pub fn new(base_url: &str, token: &str) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT)))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: token.to_owned(),
        }
    }

    /// Create client from the `[confluence]` config section.
    pub fn from_config(config: &ConfluenceConfig) -> Self {
        Self::new(&config.base_url, &config.token)
    }

    /// Server base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the API base URL.
    fn api_url(&self) -> String {
        format!("{}/rest/api", self.base_url)
    }

    /// GET `url` and decode the JSON body.
    ///
    /// Returns `None` on 404.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, ConfluenceError> {
        debug!(url, "GET");
        let response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .call()?;

        let status = response.status().as_u16();
        let mut body_reader = response.into_body();

        if status == 404 {
            return Ok(None);
        }
        if status >= 400 {
            let error_body = body_reader
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(ConfluenceError::HttpResponse {
                status,
                body: error_body,
            });
        }

        Ok(Some(body_reader.read_json()?))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_base_url_is_trimmed() {
        let client = ConfluenceClient::new("https://wiki.example.com/", "t");
        assert_eq!(client.base_url(), "https://wiki.example.com");
        assert_eq!(client.api_url(), "https://wiki.example.com/rest/api");
    }

    #[test]
    fn test_debug_hides_token() {
        let client = ConfluenceClient::new("https://wiki", "secret");
        assert!(!format!("{client:?}").contains("secret"));
    }
}
