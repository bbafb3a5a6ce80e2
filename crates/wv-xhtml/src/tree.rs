//! Arena tree for parsed storage markup.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::TreeError;
use crate::namespaces::{Namespaces, is_declaration, split_qname};

/// Source of document identities for ownership checks.
static NEXT_DOCUMENT: AtomicU32 = AtomicU32::new(1);

/// Handle to a node in a [`Document`].
///
/// Handles carry the identity of the document that issued them; passing a
/// handle to another document is rejected by every mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    document: u32,
    index: u32,
}

/// Kind of a node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// The document node above the synthetic wrapper.
    Document,
    /// Element.
    Element,
    /// Character data.
    Text,
    /// Unescaped character data block (`<![CDATA[...]]>`).
    CData,
    /// Comment.
    Comment,
    /// Processing instruction.
    ProcessingInstruction,
}

/// Element attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name as written (`ri:content-title`).
    pub name: String,
    /// Resolved namespace URI of the prefix, if any.
    pub namespace: Option<String>,
    /// Unescaped value.
    pub value: String,
}

impl Attribute {
    /// Name without its prefix.
    #[must_use]
    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    /// Whether this is a namespace declaration rather than a real attribute.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        is_declaration(&self.name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<Attribute>,
    /// Start tag content between `<` and `>` (or `/>`) as it appeared in the
    /// source. Dropped once attributes change.
    pub(crate) raw_start: Option<String>,
    /// End tag as it appeared in the source, when it differs from `</name>`.
    pub(crate) raw_end: Option<String>,
    pub(crate) self_closing: bool,
}

impl Element {
    pub(crate) fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeData {
    Document,
    Element(Element),
    /// Escaped source text and its decoded value.
    Text { raw: String, value: String },
    CData(String),
    Comment(String),
    ProcessingInstruction(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) data: NodeData,
}

/// Parsed storage document.
///
/// Node 0 is the document node; its only child is the synthetic wrapper that
/// holds the fragment's top-level nodes. Nodes created through the builder
/// methods live in the same arena, detached until inserted.
#[derive(Debug, Clone)]
pub struct Document {
    id: u32,
    pub(crate) nodes: Vec<Node>,
    pub(crate) wrapper: usize,
    pub(crate) namespaces: Namespaces,
}

impl Document {
    /// Empty document holding only the document node.
    pub(crate) fn empty(namespaces: Namespaces) -> Self {
        Self {
            id: NEXT_DOCUMENT.fetch_add(1, Ordering::Relaxed),
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Document,
            }],
            wrapper: 0,
            namespaces,
        }
    }

    pub(crate) fn handle(&self, index: usize) -> NodeId {
        NodeId {
            document: self.id,
            index: u32::try_from(index).unwrap_or(u32::MAX),
        }
    }

    /// Arena index of a handle issued by this document.
    pub(crate) fn index(&self, id: NodeId) -> Option<usize> {
        let index = id.index as usize;
        (id.document == self.id && index < self.nodes.len()).then_some(index)
    }

    fn checked(&self, id: NodeId) -> Result<usize, TreeError> {
        self.index(id).ok_or(TreeError::ForeignNode)
    }

    pub(crate) fn push(&mut self, data: NodeData) -> usize {
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            data,
        });
        self.nodes.len() - 1
    }

    /// Append without validation; used by the parser on fresh nodes.
    pub(crate) fn attach(&mut self, parent: usize, child: usize) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Namespace bindings used for new elements and queries.
    #[must_use]
    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    /// The document node (XPath root, parent of the wrapper).
    #[must_use]
    pub fn document_node(&self) -> NodeId {
        self.handle(0)
    }

    /// The synthetic wrapper; its children are the fragment's top-level nodes.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.handle(self.wrapper)
    }

    /// Whether `id` was issued by this document.
    #[must_use]
    pub fn owns(&self, id: NodeId) -> bool {
        self.index(id).is_some()
    }

    /// Kind of a node.
    #[must_use]
    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        let node = &self.nodes[self.index(id)?];
        Some(match node.data {
            NodeData::Document => NodeType::Document,
            NodeData::Element(_) => NodeType::Element,
            NodeData::Text { .. } => NodeType::Text,
            NodeData::CData(_) => NodeType::CData,
            NodeData::Comment(_) => NodeType::Comment,
            NodeData::ProcessingInstruction(_) => NodeType::ProcessingInstruction,
        })
    }

    pub(crate) fn element_at(&self, index: usize) -> Option<&Element> {
        match &self.nodes[index].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub(crate) fn element_at_mut(&mut self, index: usize) -> Option<&mut Element> {
        match &mut self.nodes[index].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        self.element_at(self.index(id)?)
    }

    /// Qualified element name (`ac:link`), `None` for non-elements.
    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    /// Element name without its prefix.
    #[must_use]
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    /// Resolved namespace URI of an element.
    #[must_use]
    pub fn namespace(&self, id: NodeId) -> Option<&str> {
        self.element(id)?.namespace.as_deref()
    }

    /// Attributes of an element in source order (empty for other nodes).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        self.element(id).map_or(&[], |e| e.attributes.as_slice())
    }

    /// Value of the attribute with qualified name `name`.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Parent node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.nodes[self.index(id)?].parent?;
        Some(self.handle(parent))
    }

    /// Child nodes in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.index(id).map_or_else(Vec::new, |index| {
            self.nodes[index]
                .children
                .iter()
                .map(|&child| self.handle(child))
                .collect()
        })
    }

    /// Concatenated text of the node and its descendants.
    ///
    /// Text and CDATA contribute; comments and processing instructions only
    /// contribute when they are the node itself.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.index(id)
            .map_or_else(String::new, |index| self.string_value(index))
    }

    pub(crate) fn string_value(&self, index: usize) -> String {
        match &self.nodes[index].data {
            NodeData::Text { value, .. } => value.clone(),
            NodeData::CData(content)
            | NodeData::Comment(content)
            | NodeData::ProcessingInstruction(content) => content.clone(),
            NodeData::Document | NodeData::Element(_) => {
                let mut out = String::new();
                self.collect_text(index, &mut out);
                out
            }
        }
    }

    fn collect_text(&self, index: usize, out: &mut String) {
        for &child in &self.nodes[index].children {
            match &self.nodes[child].data {
                NodeData::Text { value, .. } => out.push_str(value),
                NodeData::CData(content) => out.push_str(content),
                NodeData::Element(_) => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    /// Whether `ancestor` is `node` or one of its ancestors.
    fn is_ancestor_or_self(&self, ancestor: usize, node: usize) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes[current].parent;
        }
        false
    }

    fn detach_index(&mut self, index: usize) {
        if let Some(parent) = self.nodes[index].parent.take() {
            self.nodes[parent].children.retain(|&c| c != index);
        }
    }

    fn check_insert(&self, parent: usize, child: usize) -> Result<(), TreeError> {
        if !matches!(self.nodes[parent].data, NodeData::Element(_)) {
            return Err(TreeError::InvalidParent);
        }
        if child == 0 || child == self.wrapper {
            return Err(TreeError::InvalidChild);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle);
        }
        Ok(())
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A child that already has a parent is moved. Both nodes must belong to
    /// this document.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<NodeId, TreeError> {
        let parent_index = self.checked(parent)?;
        let child_index = self.checked(child)?;
        self.check_insert(parent_index, child_index)?;

        self.detach_index(child_index);
        self.attach(parent_index, child_index);
        Ok(child)
    }

    /// Replace `old` (a child of `parent`) with `new`.
    ///
    /// `new` is moved if it already has a parent. Returns the detached `old`.
    pub fn replace_child(
        &mut self,
        parent: NodeId,
        new: NodeId,
        old: NodeId,
    ) -> Result<NodeId, TreeError> {
        let parent_index = self.checked(parent)?;
        let new_index = self.checked(new)?;
        let old_index = self.checked(old)?;

        if self.nodes[old_index].parent != Some(parent_index) {
            return Err(TreeError::NotAChild);
        }
        if new_index == old_index {
            return Ok(old);
        }
        self.check_insert(parent_index, new_index)?;
        // `old` inside `new` would be lost together with its position.
        if self.is_ancestor_or_self(new_index, old_index) {
            return Err(TreeError::Cycle);
        }

        self.detach_index(new_index);
        let position = self.nodes[parent_index]
            .children
            .iter()
            .position(|&c| c == old_index)
            .ok_or(TreeError::NotAChild)?;
        self.nodes[parent_index].children[position] = new_index;
        self.nodes[new_index].parent = Some(parent_index);
        self.nodes[old_index].parent = None;
        Ok(old)
    }

    /// Detach a node from its parent. The node stays usable.
    pub fn detach(&mut self, node: NodeId) -> Result<(), TreeError> {
        let index = self.checked(node)?;
        if index == 0 || index == self.wrapper {
            return Err(TreeError::InvalidChild);
        }
        self.detach_index(index);
        Ok(())
    }

    /// Set or replace an attribute on an element.
    ///
    /// The element's start tag is regenerated on serialization afterwards.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), TreeError> {
        let index = self.checked(element)?;
        let namespace = self.resolve_attribute_namespace(name);
        let NodeData::Element(element) = &mut self.nodes[index].data else {
            return Err(TreeError::InvalidParent);
        };

        element.raw_start = None;
        match element.attributes.iter_mut().find(|a| a.name == name) {
            Some(attribute) => value.clone_into(&mut attribute.value),
            None => element.attributes.push(Attribute {
                name: name.to_owned(),
                namespace,
                value: value.to_owned(),
            }),
        }
        Ok(())
    }

    pub(crate) fn resolve_element_namespace(&self, name: &str) -> Option<String> {
        match split_qname(name) {
            (Some(prefix), _) => self.namespaces.resolve(prefix).map(str::to_owned),
            (None, _) => None,
        }
    }

    pub(crate) fn resolve_attribute_namespace(&self, name: &str) -> Option<String> {
        if is_declaration(name) {
            return None;
        }
        self.resolve_element_namespace(name)
    }

    /// Create a detached element with the given qualified name.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        let namespace = self.resolve_element_namespace(name);
        let index = self.push(NodeData::Element(Element {
            name: name.to_owned(),
            namespace,
            attributes: Vec::new(),
            raw_start: None,
            raw_end: None,
            self_closing: true,
        }));
        self.handle(index)
    }

    /// Create a detached text node. The content is escaped on serialization.
    pub fn create_text(&mut self, content: &str) -> NodeId {
        let raw = quick_xml::escape::partial_escape(content).into_owned();
        let index = self.push(NodeData::Text {
            raw,
            value: content.to_owned(),
        });
        self.handle(index)
    }

    /// Create a detached character-data block.
    ///
    /// The content is written inside `<![CDATA[...]]>` and never re-escaped,
    /// which keeps literal markup payloads (macro bodies) intact.
    pub fn create_text_block(&mut self, content: &str) -> NodeId {
        let index = self.push(NodeData::CData(content.to_owned()));
        self.handle(index)
    }

    /// Create a detached comment.
    pub fn create_comment(&mut self, content: &str) -> NodeId {
        let index = self.push(NodeData::Comment(content.to_owned()));
        self.handle(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(markup: &str) -> Document {
        Document::parse(markup).unwrap()
    }

    #[test]
    fn test_root_children_are_top_level_nodes() {
        let doc = doc("<p>a</p><p>b</p>");
        let children = doc.children(doc.root());
        assert_eq!(children.len(), 2);
        assert_eq!(doc.name(children[0]), Some("p"));
        assert_eq!(doc.parent(doc.root()), Some(doc.document_node()));
    }

    #[test]
    fn test_element_namespace_resolution() {
        let doc = doc(r#"<ac:link><ri:page ri:content-title="Home" /></ac:link>"#);
        let link = doc.children(doc.root())[0];
        let page = doc.children(link)[0];
        assert_eq!(doc.namespace(link), Some("urn:confluence-prefix:ac"));
        assert_eq!(doc.local_name(page), Some("page"));
        let attribute = &doc.attributes(page)[0];
        assert_eq!(attribute.namespace.as_deref(), Some("urn:confluence-prefix:ri"));
        assert_eq!(attribute.local_name(), "content-title");
    }

    #[test]
    fn test_text_content_includes_cdata() {
        let doc = doc("<p>a<b>b</b><![CDATA[<c>]]></p>");
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "ab<c>");
    }

    #[test]
    fn test_append_moves_attached_node() {
        let mut doc = doc("<p><b>x</b></p><div></div>");
        let top = doc.children(doc.root());
        let b = doc.children(top[0])[0];
        doc.append_child(top[1], b).unwrap();
        assert!(doc.children(top[0]).is_empty());
        assert_eq!(doc.parent(b), Some(top[1]));
        assert_eq!(doc.serialize(), "<p></p><div><b>x</b></div>");
    }

    #[test]
    fn test_append_rejects_foreign_node() {
        let mut first = doc("<p></p>");
        let mut second = doc("<p></p>");
        let foreign = second.create_element("span");
        let root = first.root();
        assert_eq!(first.append_child(root, foreign), Err(TreeError::ForeignNode));
    }

    #[test]
    fn test_append_rejects_cycle() {
        let mut doc = doc("<p><b></b></p>");
        let p = doc.children(doc.root())[0];
        let b = doc.children(p)[0];
        assert_eq!(doc.append_child(b, p), Err(TreeError::Cycle));
        assert_eq!(doc.append_child(p, p), Err(TreeError::Cycle));
    }

    #[test]
    fn test_append_rejects_text_parent_and_wrapper_child() {
        let mut doc = doc("<p>text</p>");
        let p = doc.children(doc.root())[0];
        let text = doc.children(p)[0];
        let span = doc.create_element("span");
        assert_eq!(doc.append_child(text, span), Err(TreeError::InvalidParent));
        let root = doc.root();
        assert_eq!(doc.append_child(p, root), Err(TreeError::InvalidChild));
    }

    #[test]
    fn test_replace_child() {
        let mut doc = doc("<p>a</p><p>b</p>");
        let root = doc.root();
        let first = doc.children(root)[0];
        let hr = doc.create_element("hr");
        let old = doc.replace_child(root, hr, first).unwrap();
        assert_eq!(old, first);
        assert_eq!(doc.parent(first), None);
        assert_eq!(doc.serialize(), "<hr /><p>b</p>");
    }

    #[test]
    fn test_replace_child_requires_child_of_parent() {
        let mut doc = doc("<p><b></b></p><p></p>");
        let top = doc.children(doc.root());
        let b = doc.children(top[0])[0];
        let hr = doc.create_element("hr");
        assert_eq!(doc.replace_child(top[1], hr, b), Err(TreeError::NotAChild));
    }

    #[test]
    fn test_replace_child_with_own_descendant_is_a_cycle() {
        let mut doc = doc("<div><p><b></b></p></div>");
        let div = doc.children(doc.root())[0];
        let p = doc.children(div)[0];
        let b = doc.children(p)[0];
        assert_eq!(doc.replace_child(div, p, p), Ok(p));
        assert_eq!(doc.replace_child(p, div, b), Err(TreeError::Cycle));
    }

    #[test]
    fn test_set_attribute_regenerates_start_tag() {
        let mut doc = doc(r#"<a  href='x'>t</a>"#);
        let a = doc.children(doc.root())[0];
        assert_eq!(doc.serialize(), r#"<a  href='x'>t</a>"#);
        doc.set_attribute(a, "href", "y&z").unwrap();
        assert_eq!(doc.serialize(), r#"<a href="y&amp;z">t</a>"#);
    }

    #[test]
    fn test_create_text_escapes_on_output() {
        let mut doc = doc("<p></p>");
        let p = doc.children(doc.root())[0];
        let text = doc.create_text("a < b & c");
        doc.append_child(p, text).unwrap();
        assert_eq!(doc.serialize(), "<p>a &lt; b &amp; c</p>");
        assert_eq!(doc.text_content(p), "a < b & c");
    }
}
