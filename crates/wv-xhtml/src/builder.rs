//! Shorthand construction of element subtrees.

use crate::error::{ParseError, TreeError};
use crate::tree::{Document, NodeId};

/// Child passed to [`Document::build`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// Existing node of the same document; moved under the new element.
    Node(NodeId),
    /// Text content, escaped on output.
    Text(String),
}

impl From<NodeId> for Child {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl Document {
    /// Create a detached element with attributes and children in one call.
    ///
    /// ```
    /// use wv_xhtml::{Child, Document};
    ///
    /// let mut doc = Document::parse("<p></p>")?;
    /// let param = doc.build("ac:parameter", &[("ac:name", "id")], vec![Child::from("ve4-1")])?;
    /// let span = doc.build("ac:structured-macro", &[("ac:name", "span")], vec![param.into()])?;
    /// let root = doc.root();
    /// doc.append_child(root, span)?;
    /// assert!(doc.serialize().contains(r#"<ac:parameter ac:name="id">ve4-1</ac:parameter>"#));
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn build(
        &mut self,
        tag: &str,
        attributes: &[(&str, &str)],
        children: Vec<Child>,
    ) -> Result<NodeId, TreeError> {
        let element = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(element, name, value)?;
        }
        for child in children {
            let node = match child {
                Child::Node(id) => id,
                Child::Text(text) => self.create_text(&text),
            };
            self.append_child(element, node)?;
        }
        Ok(element)
    }

    /// Parse a markup fragment into detached nodes of this document.
    ///
    /// The nodes keep their source text and can be inserted with
    /// [`append_child`](Self::append_child).
    pub fn parse_fragment(&mut self, markup: &str) -> Result<Vec<NodeId>, ParseError> {
        let imported = Self::parse_with(markup, self.namespaces.clone())?;
        let offset = self.nodes.len();
        let top_level = imported.nodes[imported.wrapper].children.clone();

        // Skip the document node and the wrapper, shift the rest into this arena.
        let shift = |index: usize| index - 2 + offset;
        for node in imported.nodes.into_iter().skip(2) {
            let parent = node.parent.filter(|&p| p >= 2).map(shift);
            let children = node.children.into_iter().map(shift).collect();
            self.nodes.push(crate::tree::Node {
                parent,
                children,
                data: node.data,
            });
        }
        Ok(top_level.into_iter().map(|i| self.handle(shift(i))).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_nested() {
        let mut doc = Document::parse("<p>x</p>").unwrap();
        let inner = doc.build("b", &[], vec!["bold".into()]).unwrap();
        let outer = doc
            .build("span", &[("class", "k")], vec![inner.into(), " tail".into()])
            .unwrap();
        let root = doc.root();
        doc.append_child(root, outer).unwrap();
        assert_eq!(doc.serialize(), r#"<p>x</p><span class="k"><b>bold</b> tail</span>"#);
    }

    #[test]
    fn test_build_empty_element_self_closes() {
        let mut doc = Document::parse("").unwrap();
        let page = doc
            .build("ri:page", &[("ri:content-title", "A & B")], Vec::new())
            .unwrap();
        let root = doc.root();
        doc.append_child(root, page).unwrap();
        assert_eq!(doc.serialize(), r#"<ri:page ri:content-title="A &amp; B" />"#);
        assert_eq!(doc.namespace(page), Some("urn:confluence-prefix:ri"));
    }

    #[test]
    fn test_build_rejects_foreign_child() {
        let mut doc = Document::parse("").unwrap();
        let mut other = Document::parse("").unwrap();
        let foreign = other.create_element("p");
        assert_eq!(
            doc.build("div", &[], vec![foreign.into()]),
            Err(TreeError::ForeignNode)
        );
    }

    #[test]
    fn test_parse_fragment_imports_detached_nodes() {
        let mut doc = Document::parse("<p>a</p>").unwrap();
        let nodes = doc
            .parse_fragment(r#"<ac:structured-macro ac:name="info"><ac:rich-text-body>x&nbsp;y</ac:rich-text-body></ac:structured-macro>tail"#)
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(doc.parent(nodes[0]), None);
        assert_eq!(doc.name(nodes[0]), Some("ac:structured-macro"));
        assert_eq!(doc.text_content(nodes[0]), "x\u{a0}y");

        let root = doc.root();
        for node in nodes {
            doc.append_child(root, node).unwrap();
        }
        assert_eq!(
            doc.serialize(),
            r#"<p>a</p><ac:structured-macro ac:name="info"><ac:rich-text-body>x&nbsp;y</ac:rich-text-body></ac:structured-macro>tail"#
        );
    }
}
