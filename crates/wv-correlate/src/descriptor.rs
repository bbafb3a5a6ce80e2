//! Correlation descriptors.

use std::fmt;

use wv_dom::{LiveDocument, NodeId as ElementId};
use wv_xhtml::{Document, NodeId};

type Extract<'a, S> = Box<dyn Fn(&Document, NodeId, &ElementSnapshot) -> S + 'a>;
type Factory<'a, S, W> = Box<dyn Fn(&ElementSnapshot, Option<&S>) -> W + 'a>;

/// Owned copy of a live element taken at correlation time.
///
/// Factories see the element as it was when the live query ran, so later
/// mutation of the live document (hiding, mounting) cannot change what a
/// factory reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub id: ElementId,
    pub tag_name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
}

impl ElementSnapshot {
    /// Capture `id` from `dom`.
    #[must_use]
    pub fn capture(dom: &LiveDocument, id: ElementId) -> Self {
        Self {
            id,
            tag_name: dom.tag_name(id).unwrap_or_default().to_owned(),
            attributes: dom.attributes(id).to_vec(),
            text: dom.text_content(id),
        }
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A storage query, a live selector and what to build from each matched pair.
///
/// `S` is the auxiliary record derived by the optional extraction step and `W`
/// is whatever the factory produces, typically a widget with its props.
pub struct Descriptor<'a, S, W> {
    pub(crate) storage: String,
    pub(crate) live: String,
    pub(crate) extract: Option<Extract<'a, S>>,
    pub(crate) factory: Factory<'a, S, W>,
}

impl<'a, S, W> Descriptor<'a, S, W> {
    /// Create a descriptor without an extraction step.
    pub fn new(
        storage: impl Into<String>,
        live: impl Into<String>,
        factory: impl Fn(&ElementSnapshot, Option<&S>) -> W + 'a,
    ) -> Self {
        Self {
            storage: storage.into(),
            live: live.into(),
            extract: None,
            factory: Box::new(factory),
        }
    }

    /// Derive an auxiliary record from each `(node, element)` pair before the factory runs.
    #[must_use]
    pub fn with_extract(
        mut self,
        extract: impl Fn(&Document, NodeId, &ElementSnapshot) -> S + 'a,
    ) -> Self {
        self.extract = Some(Box::new(extract));
        self
    }

    /// XPath evaluated against the storage document.
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// CSS selector evaluated against the live content root.
    pub fn live(&self) -> &str {
        &self.live
    }
}

impl<S, W> fmt::Debug for Descriptor<'_, S, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("storage", &self.storage)
            .field("live", &self.live)
            .field("extract", &self.extract.is_some())
            .finish_non_exhaustive()
    }
}
