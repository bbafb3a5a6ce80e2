//! Count-checked pairing of storage nodes with live elements.

use std::iter::FusedIterator;

use tracing::debug;
use wv_dom::{LiveDocument, NodeId as ElementId};
use wv_xhtml::{Document, NodeId, XPath};

use crate::descriptor::{Descriptor, ElementSnapshot};
use crate::error::CorrelationError;

/// One storage node paired with the live element it rendered into.
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle<W> {
    /// Factory output for this pair.
    pub widget: W,
    /// Live element the widget is mounted in front of.
    pub anchor: ElementId,
    /// Storage node the element was rendered from.
    pub source: NodeId,
}

struct Pair<S> {
    source: NodeId,
    element: ElementSnapshot,
    record: Option<S>,
}

/// Finite, single-pass sequence of bundles.
///
/// The count check and the extraction step have already run when a
/// `Correlation` exists, so iteration cannot fail. The factory runs lazily,
/// one pair per call to `next`. Nothing borrows either document, so callers
/// may mutate both between bundles.
pub struct Correlation<'a, S, W> {
    storage: String,
    live: String,
    pairs: std::vec::IntoIter<Pair<S>>,
    factory: Box<dyn Fn(&ElementSnapshot, Option<&S>) -> W + 'a>,
}

impl<S, W> Correlation<'_, S, W> {
    /// Storage query this sequence was produced from.
    pub fn storage(&self) -> &str {
        &self.storage
    }

    /// Live selector this sequence was produced from.
    pub fn live(&self) -> &str {
        &self.live
    }
}

impl<S, W> Iterator for Correlation<'_, S, W> {
    type Item = Bundle<W>;

    fn next(&mut self) -> Option<Self::Item> {
        let pair = self.pairs.next()?;
        let widget = (self.factory)(&pair.element, pair.record.as_ref());
        Some(Bundle {
            widget,
            anchor: pair.element.id,
            source: pair.source,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.pairs.size_hint()
    }
}

impl<S, W> ExactSizeIterator for Correlation<'_, S, W> {}

impl<S, W> FusedIterator for Correlation<'_, S, W> {}

impl<S, W> std::fmt::Debug for Correlation<'_, S, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Correlation")
            .field("storage", &self.storage)
            .field("live", &self.live)
            .field("remaining", &self.pairs.len())
            .finish_non_exhaustive()
    }
}

/// Correlate `descriptor` against a storage document and the live elements below `scope`.
///
/// Fails with [`CorrelationError::Mismatch`] when the storage query and the
/// live selector match different numbers of nodes; no bundle is produced in
/// that case. Otherwise the `i`-th storage node (document order) is paired
/// with the `i`-th live element (tree order).
pub fn correlate<'a, S, W>(
    source: &Document,
    live: &LiveDocument,
    scope: ElementId,
    descriptor: Descriptor<'a, S, W>,
) -> Result<Correlation<'a, S, W>, CorrelationError> {
    let Descriptor {
        storage,
        live: selector,
        extract,
        factory,
    } = descriptor;

    let nodes = XPath::compile(&storage, source.namespaces())
        .and_then(|query| query.select(source, source.document_node()))
        .map_err(|source| CorrelationError::Storage {
            query: storage.clone(),
            source,
        })?;
    let elements = live
        .query_selector_all(scope, &selector)
        .map_err(|source| CorrelationError::Live {
            selector: selector.clone(),
            source,
        })?;

    debug!(
        storage = %storage,
        live = %selector,
        nodes = nodes.len(),
        elements = elements.len(),
        "Correlating"
    );

    if nodes.len() != elements.len() {
        return Err(CorrelationError::Mismatch {
            nodes: nodes.len(),
            elements: elements.len(),
            storage,
            live: selector,
        });
    }

    let pairs: Vec<Pair<S>> = nodes
        .into_iter()
        .zip(elements)
        .map(|(node, element)| {
            let element = ElementSnapshot::capture(live, element);
            let record = extract.as_ref().map(|extract| extract(source, node, &element));
            Pair {
                source: node,
                element,
                record,
            }
        })
        .collect();

    Ok(Correlation {
        storage,
        live: selector,
        pairs: pairs.into_iter(),
        factory,
    })
}
