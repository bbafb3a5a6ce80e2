//! Markup output with the synthetic wrapper stripped.

use quick_xml::escape::escape;

use crate::tree::{Document, NodeData, NodeId};

impl Document {
    /// Serialize the fragment: the wrapper's children, without the wrapper.
    ///
    /// Parsed elements whose attributes were not touched reuse their source
    /// start tag and parsed text keeps its source escaping, so an unmodified
    /// document reproduces its input.
    #[must_use]
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for &child in &self.nodes[self.wrapper].children {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Serialize a single node and its subtree (outer markup).
    #[must_use]
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(index) = self.index(id) {
            self.write_node(index, &mut out);
        }
        out
    }

    fn write_node(&self, index: usize, out: &mut String) {
        let node = &self.nodes[index];
        match &node.data {
            NodeData::Document => {
                for &child in &node.children {
                    self.write_node(child, out);
                }
            }
            NodeData::Element(element) => {
                out.push('<');
                match &element.raw_start {
                    Some(raw) => out.push_str(raw),
                    None => {
                        out.push_str(&element.name);
                        for attribute in &element.attributes {
                            out.push(' ');
                            out.push_str(&attribute.name);
                            out.push_str("=\"");
                            out.push_str(&escape(attribute.value.as_str()));
                            out.push('"');
                        }
                    }
                }

                if node.children.is_empty() && element.self_closing {
                    // Generated tags get the spaced form Confluence emits.
                    out.push_str(if element.raw_start.is_some() { "/>" } else { " />" });
                    return;
                }

                out.push('>');
                for &child in &node.children {
                    self.write_node(child, out);
                }
                match &element.raw_end {
                    Some(raw) => out.push_str(raw),
                    None => {
                        out.push_str("</");
                        out.push_str(&element.name);
                        out.push('>');
                    }
                }
            }
            NodeData::Text { raw, .. } => out.push_str(raw),
            NodeData::CData(content) => {
                // A literal `]]>` has to be split across two sections.
                out.push_str("<![CDATA[");
                out.push_str(&content.replace("]]>", "]]]]><![CDATA[>"));
                out.push_str("]]>");
            }
            NodeData::Comment(content) => {
                out.push_str("<!--");
                out.push_str(content);
                out.push_str("-->");
            }
            NodeData::ProcessingInstruction(content) => {
                out.push_str("<?");
                out.push_str(content);
                out.push_str("?>");
            }
        }
    }
}
