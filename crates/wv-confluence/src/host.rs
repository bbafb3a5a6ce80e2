//! Confluence-backed content source.
//!
//! Page metadata lives in the `<view prefix>.page` content property of the
//! page itself. A page belongs to the document whose root is the nearest
//! ancestor-or-self page carrying a `<view prefix>.document` property.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use wv_config::SiteConfig;
use wv_directives::{ContentSource, DocumentHandle, HostError, Metadata, PageMeta};

use crate::client::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::types::Page;

/// Content source for one Confluence page.
#[derive(Debug)]
pub struct ConfluenceHost {
    client: Arc<ConfluenceClient>,
    page: PageMeta,
    storage: Option<String>,
    view: Option<String>,
    /// Pages that may be the document root, nearest first.
    candidates: Vec<DocumentHandle>,
    page_property: String,
    document_property: String,
}

impl ConfluenceHost {
    /// Fetch `page_id` and build a host for it.
    pub async fn load(
        client: Arc<ConfluenceClient>,
        page_id: &str,
        site: &SiteConfig,
        view_prefix: &str,
    ) -> Result<Self, HostError> {
        let fetch = Arc::clone(&client);
        let id = page_id.to_owned();
        let page = blocking(move || fetch.get_page(&id)).await?;
        info!(page_id, title = %page.title, "Loaded page");
        Ok(Self::from_page(client, &page, site, view_prefix))
    }

    /// Build a host from an already fetched page.
    ///
    /// `site` settings fill in what the page response lacks; the base URL
    /// falls back to the client's server URL.
    pub fn from_page(
        client: Arc<ConfluenceClient>,
        page: &Page,
        site: &SiteConfig,
        view_prefix: &str,
    ) -> Self {
        let base_url = site
            .base_url
            .clone()
            .unwrap_or_else(|| client.base_url().to_owned());
        let space_key = page
            .space
            .as_ref()
            .map(|space| space.key.clone())
            .or_else(|| site.space_key.clone())
            .unwrap_or_default();

        let candidates = std::iter::once(DocumentHandle {
            page_id: page.id.clone(),
            title: page.title.clone(),
        })
        .chain(page.ancestors.iter().rev().map(|ancestor| DocumentHandle {
            page_id: ancestor.id.clone(),
            title: ancestor.title.clone(),
        }))
        .collect();

        Self {
            page: PageMeta {
                page_id: page.id.clone(),
                title: page.title.clone(),
                space_key,
                base_url,
            },
            storage: page.storage().map(str::to_owned),
            view: page.view().map(str::to_owned),
            candidates,
            page_property: format!("{view_prefix}.page"),
            document_property: format!("{view_prefix}.document"),
            client,
        }
    }

    /// Rendered HTML of the page.
    pub fn view_markup(&self) -> Option<&str> {
        self.view.as_deref()
    }

    async fn property(&self, page_id: &str, key: &str) -> Result<Option<Metadata>, HostError> {
        let client = Arc::clone(&self.client);
        let page_id = page_id.to_owned();
        let key = key.to_owned();
        blocking(move || client.get_property(&page_id, &key)).await
    }
}

#[async_trait]
impl ContentSource for ConfluenceHost {
    fn page(&self) -> &PageMeta {
        &self.page
    }

    /// Every call reads the property from the server.
    async fn page_metadata(&self, _refresh: bool) -> Result<Option<Metadata>, HostError> {
        self.property(&self.page.page_id, &self.page_property).await
    }

    async fn document(&self) -> Result<Option<DocumentHandle>, HostError> {
        for candidate in &self.candidates {
            if self
                .property(&candidate.page_id, &self.document_property)
                .await?
                .is_some()
            {
                debug!(document = %candidate.title, "Found document root");
                return Ok(Some(candidate.clone()));
            }
        }
        Ok(None)
    }

    async fn source_markup(&self) -> Result<Option<String>, HostError> {
        Ok(self.storage.clone())
    }

    async fn document_metadata(
        &self,
        document: &DocumentHandle,
    ) -> Result<Option<Metadata>, HostError> {
        self.property(&document.page_id, &self.document_property).await
    }
}

/// Run a blocking client call off the async runtime.
async fn blocking<T, F>(call: F) -> Result<T, HostError>
where
    F: FnOnce() -> Result<T, ConfluenceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| HostError::Request(format!("request task failed: {e}")))?
        .map_err(HostError::from)
}
