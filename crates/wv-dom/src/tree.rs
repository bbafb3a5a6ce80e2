//! Arena tree for rendered HTML.

use crate::error::DomError;

/// Handle to a node in a [`LiveDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct Element {
    /// Lowercase tag name.
    pub(crate) tag_name: String,
    /// Lowercase attribute names with decoded values, in source order.
    pub(crate) attrs: Vec<(String, String)>,
}

impl Element {
    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
pub(crate) enum NodeType {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) node_type: NodeType,
}

/// Rendered page the widgets are mounted into.
///
/// Parsing never rejects ordinary tag soup: unclosed elements are closed by
/// the next matching end tag or at end of input, stray end tags are dropped.
#[derive(Debug, Clone)]
pub struct LiveDocument {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Default for LiveDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveDocument {
    /// Empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                node_type: NodeType::Document,
            }],
            root: NodeId(0),
        }
    }

    pub(crate) fn push(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// The document node.
    #[must_use]
    pub fn document_node(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode)
    }

    pub(crate) fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.node_type {
            NodeType::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        match &mut self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode)?.node_type {
            NodeType::Element(element) => Ok(element),
            _ => Err(DomError::InvalidParent),
        }
    }

    /// Whether the node is an element.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    /// Lowercase tag name of an element.
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag_name.as_str())
    }

    /// Attribute value.
    #[must_use]
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(&name.to_ascii_lowercase())
    }

    /// Attributes of an element in source order.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        self.element(id).map_or(&[], |e| e.attrs.as_slice())
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(id)?;
        match element.attrs.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => value.clone_into(&mut entry.1),
            None => element.attrs.push((name, value.to_owned())),
        }
        Ok(())
    }

    /// Remove an attribute, returning its old value.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, DomError> {
        let name = name.to_ascii_lowercase();
        let element = self.element_mut(id)?;
        let position = element.attrs.iter().position(|(key, _)| *key == name);
        Ok(position.map(|index| element.attrs.remove(index).1))
    }

    /// Parent node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    /// Child nodes in order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id.0).map_or(&[], |n| n.children.as_slice())
    }

    /// Element children in order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id).iter().copied().filter(|&c| self.is_element(c))
    }

    pub(crate) fn previous_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|&c| c == id)?;
        siblings[..position]
            .iter()
            .rev()
            .copied()
            .find(|&c| self.is_element(c))
    }

    pub(crate) fn next_element_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let position = siblings.iter().position(|&c| c == id)?;
        siblings[position + 1..]
            .iter()
            .copied()
            .find(|&c| self.is_element(c))
    }

    /// Whether the node is reachable from the document node.
    #[must_use]
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if node == self.root {
                return true;
            }
            cursor = self.parent(node);
        }
        false
    }

    /// Concatenated text of all descendant text nodes.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.node_type {
            NodeType::Text(text) => out.push_str(text),
            NodeType::Document | NodeType::Element(_) => {
                for &child in &node.children {
                    self.collect_text(child, out);
                }
            }
            NodeType::Doctype(_) | NodeType::Comment(_) => {}
        }
    }

    /// Elements below `id` (excluding `id`) in tree order.
    pub(crate) fn descendant_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(id) {
            if self.is_element(child) {
                out.push(child);
            }
            self.descendant_elements(child, out);
        }
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag_name: &str) -> NodeId {
        self.push(
            None,
            NodeType::Element(Element {
                tag_name: tag_name.to_ascii_lowercase(),
                attrs: Vec::new(),
            }),
        )
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(None, NodeType::Text(text.to_owned()))
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Insert `node` before `reference` under `parent`; `None` appends.
    ///
    /// A node that is already in the tree is moved.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        reference: Option<NodeId>,
    ) -> Result<NodeId, DomError> {
        let parent_node = self.node(parent)?;
        if !matches!(parent_node.node_type, NodeType::Element(_) | NodeType::Document) {
            return Err(DomError::InvalidParent);
        }
        self.node(node)?;
        if node == self.root {
            return Err(DomError::InvalidChild);
        }
        if let Some(reference) = reference {
            if self.node(reference)?.parent != Some(parent) {
                return Err(DomError::NotAChild);
            }
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == node {
                return Err(DomError::Cycle);
            }
            cursor = self.parent(current);
        }
        if reference == Some(node) {
            return Ok(node);
        }

        self.detach(node);
        let children = &mut self.nodes[parent.0].children;
        let index = match reference {
            Some(reference) => children
                .iter()
                .position(|&c| c == reference)
                .ok_or(DomError::NotAChild)?,
            None => children.len(),
        };
        children.insert(index, node);
        self.nodes[node.0].parent = Some(parent);
        Ok(node)
    }

    /// Append `node` as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, node: NodeId) -> Result<NodeId, DomError> {
        self.insert_before(parent, node, None)
    }

    /// Remove a node from its parent.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.node(id)?;
        self.detach(id);
        Ok(())
    }

    /// Value of one inline style property.
    #[must_use]
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        let style = self.get_attribute(id, "style")?;
        parse_style_declarations(style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set one inline style property, keeping the others.
    pub fn set_style_property(
        &mut self,
        id: NodeId,
        property: &str,
        value: &str,
    ) -> Result<(), DomError> {
        let mut declarations = self
            .get_attribute(id, "style")
            .map(parse_style_declarations)
            .unwrap_or_default();
        let property = property.trim().to_ascii_lowercase();
        match declarations.iter_mut().find(|(name, _)| *name == property) {
            Some(entry) => value.trim().clone_into(&mut entry.1),
            None => declarations.push((property, value.trim().to_owned())),
        }
        self.set_attribute(id, "style", &serialize_style_declarations(&declarations))
    }

    /// Hide an element with `display: none`. Hiding twice changes nothing.
    pub fn hide(&mut self, id: NodeId) -> Result<(), DomError> {
        self.set_style_property(id, "display", "none")
    }

    /// Whether the element is hidden by its inline style.
    #[must_use]
    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.style_property(id, "display").as_deref() == Some("none")
    }
}

fn parse_style_declarations(style: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for declaration in style.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_owned();
        match out.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => out.push((name, value)),
        }
    }
    out
}

fn serialize_style_declarations(declarations: &[(String, String)]) -> String {
    let mut out = String::new();
    for (index, (name, value)) in declarations.iter().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push(';');
    }
    out
}
