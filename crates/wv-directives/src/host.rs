//! Host content source.
//!
//! The page being augmented and the Confluence instance it lives on are
//! reached only through [`ContentSource`]. [`LocalHost`] serves everything
//! from memory.

use async_trait::async_trait;
use serde_json::Value;

/// Metadata bundle attached to a page or document.
pub type Metadata = Value;

/// Facts about the current page known before anything is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMeta {
    pub page_id: String,
    pub title: String,
    pub space_key: String,
    /// Absolute wiki URL without trailing slash.
    pub base_url: String,
}

/// The tracked document a page belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHandle {
    /// Page that carries the document metadata.
    pub page_id: String,
    pub title: String,
}

/// Error reported by a host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HostError {
    /// The current user may not read the resource.
    #[error("permission denied: {0}")]
    Permissions(String),

    /// A metadata bundle exists but cannot be read.
    #[error("invalid metadata: {0}")]
    Metadata(String),

    /// Transport or server failure.
    #[error("host request failed: {0}")]
    Request(String),
}

/// Source of page content, metadata and document membership.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// The current page.
    fn page(&self) -> &PageMeta;

    /// Page metadata bundle; `refresh` bypasses any cache.
    async fn page_metadata(&self, refresh: bool) -> Result<Option<Metadata>, HostError>;

    /// Document the page is a member of, if any.
    async fn document(&self) -> Result<Option<DocumentHandle>, HostError>;

    /// Storage-format markup of the page.
    async fn source_markup(&self) -> Result<Option<String>, HostError>;

    /// Metadata bundle of `document`.
    async fn document_metadata(
        &self,
        document: &DocumentHandle,
    ) -> Result<Option<Metadata>, HostError>;
}

/// In-memory host.
#[derive(Debug, Clone)]
pub struct LocalHost {
    page: PageMeta,
    source: Option<String>,
    page_metadata: Option<Metadata>,
    document: Option<DocumentHandle>,
    document_metadata: Option<Metadata>,
}

impl LocalHost {
    /// Page with no source, metadata or document.
    pub fn new(page: PageMeta) -> Self {
        Self {
            page,
            source: None,
            page_metadata: None,
            document: None,
            document_metadata: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, markup: impl Into<String>) -> Self {
        self.source = Some(markup.into());
        self
    }

    #[must_use]
    pub fn with_page_metadata(mut self, metadata: Metadata) -> Self {
        self.page_metadata = Some(metadata);
        self
    }

    /// Make the page a member of `document`, optionally with metadata.
    #[must_use]
    pub fn with_document(mut self, document: DocumentHandle, metadata: Option<Metadata>) -> Self {
        self.document = Some(document);
        self.document_metadata = metadata;
        self
    }
}

#[async_trait]
impl ContentSource for LocalHost {
    fn page(&self) -> &PageMeta {
        &self.page
    }

    async fn page_metadata(&self, _refresh: bool) -> Result<Option<Metadata>, HostError> {
        Ok(self.page_metadata.clone())
    }

    async fn document(&self) -> Result<Option<DocumentHandle>, HostError> {
        Ok(self.document.clone())
    }

    async fn source_markup(&self) -> Result<Option<String>, HostError> {
        Ok(self.source.clone())
    }

    async fn document_metadata(
        &self,
        document: &DocumentHandle,
    ) -> Result<Option<Metadata>, HostError> {
        if self.document.as_ref() != Some(document) {
            return Ok(None);
        }
        Ok(self.document_metadata.clone())
    }
}
