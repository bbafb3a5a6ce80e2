//! Strict fragment parser built on quick-xml.

use std::str::from_utf8;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use crate::entities;
use crate::error::ParseError;
use crate::namespaces::{Namespaces, is_declaration, split_qname};
use crate::tree::{Attribute, Document, Element, NodeData};

impl Document {
    /// Parse a storage-format fragment with the Confluence prefixes bound.
    pub fn parse(markup: &str) -> Result<Self, ParseError> {
        Self::parse_with(markup, Namespaces::confluence())
    }

    /// Parse a fragment with custom prefix bindings.
    ///
    /// HTML named entities are resolved where they occur in text and
    /// attribute values; CDATA sections, comments and processing instructions
    /// are kept verbatim.
    pub fn parse_with(markup: &str, namespaces: Namespaces) -> Result<Self, ParseError> {
        let open = namespaces.wrapper_open();
        let prefix_len = open.len() as u64;
        let wrapped = format!("{open}{markup}");

        let mut reader = Reader::from_str(&wrapped);
        reader.config_mut().trim_text(false);

        let mut builder = TreeBuilder::new(namespaces);
        loop {
            let offset = reader.buffer_position();
            let position = offset.saturating_sub(prefix_len);
            match reader.read_event() {
                Ok(Event::Eof) => break,
                Ok(Event::End(_)) => {
                    let raw = span(&wrapped, offset, reader.buffer_position());
                    builder.close(raw)?;
                }
                Ok(event) => builder.event(event, position)?,
                Err(source) => {
                    return Err(ParseError::Xml {
                        position: reader.error_position().saturating_sub(prefix_len),
                        source,
                    });
                }
            }
        }

        let document = builder.finish()?;
        debug!(nodes = document.nodes.len(), "Parsed storage fragment");
        Ok(document)
    }
}

/// Pending run of adjacent text and reference events.
#[derive(Default)]
struct TextRun {
    raw: String,
    value: String,
}

struct TreeBuilder {
    document: Document,
    /// Open elements, outermost first. The first entry is the wrapper.
    stack: Vec<usize>,
    /// Prefix declarations made by each open element.
    scopes: Vec<Vec<(String, String)>>,
    text: Option<TextRun>,
}

impl TreeBuilder {
    fn new(namespaces: Namespaces) -> Self {
        Self {
            document: Document::empty(namespaces),
            stack: Vec::new(),
            scopes: Vec::new(),
            text: None,
        }
    }

    fn current(&self) -> usize {
        self.stack.last().copied().unwrap_or(0)
    }

    fn event(&mut self, event: Event<'_>, position: u64) -> Result<(), ParseError> {
        match event {
            Event::Text(text) => {
                let raw = from_utf8(&text)?;
                if raw.contains('&') {
                    return Err(ParseError::BareAmpersand { position });
                }
                check_characters(raw, position)?;
                let run = self.text.get_or_insert_with(TextRun::default);
                run.raw.push_str(raw);
                run.value.push_str(raw);
            }
            Event::GeneralRef(reference) => {
                let name = from_utf8(&reference)?;
                let Some(ch) = entities::resolve_reference(name) else {
                    return Err(ParseError::UndefinedEntity {
                        name: name.to_owned(),
                        position,
                    });
                };
                if !is_allowed_char(ch) {
                    return Err(ParseError::InvalidCharacter {
                        code: u32::from(ch),
                        position,
                    });
                }
                let run = self.text.get_or_insert_with(TextRun::default);
                run.raw.push('&');
                run.raw.push_str(name);
                run.raw.push(';');
                run.value.push(ch);
            }
            Event::Start(start) => {
                self.flush_text();
                let index = self.element(&start, false, position)?;
                if self.stack.is_empty() {
                    self.document.wrapper = index;
                    self.document.attach(0, index);
                } else {
                    self.document.attach(self.current(), index);
                }
                self.stack.push(index);
            }
            Event::Empty(start) => {
                self.flush_text();
                let index = self.element(&start, true, position)?;
                self.scopes.pop();
                self.document.attach(self.current(), index);
            }
            // End tags need their source text and go through `close`.
            Event::End(_) => {}
            Event::CData(data) => {
                self.flush_text();
                let content = from_utf8(&data)?.to_owned();
                self.push_leaf(NodeData::CData(content));
            }
            Event::Comment(comment) => {
                self.flush_text();
                let content = from_utf8(&comment)?.to_owned();
                self.push_leaf(NodeData::Comment(content));
            }
            Event::PI(instruction) => {
                self.flush_text();
                let content = from_utf8(&instruction)?.to_owned();
                self.push_leaf(NodeData::ProcessingInstruction(content));
            }
            Event::Decl(_) => return Err(ParseError::Misplaced("XML declaration")),
            Event::DocType(_) => return Err(ParseError::Misplaced("document type declaration")),
            Event::Eof => {}
        }
        Ok(())
    }

    /// Close the innermost open element, remembering a non-canonical end tag.
    fn close(&mut self, raw: &str) -> Result<(), ParseError> {
        self.flush_text();
        if self.stack.len() <= 1 {
            return Err(ParseError::Misplaced("closing tag of the synthetic root"));
        }
        let index = self.current();
        if let Some(element) = self.document.element_at_mut(index) {
            let canonical =
                raw.strip_prefix("</").and_then(|r| r.strip_suffix('>')) == Some(element.name.as_str());
            if !canonical {
                element.raw_end = Some(raw.to_owned());
            }
        }
        self.stack.pop();
        self.scopes.pop();
        Ok(())
    }

    /// Build an element node and open its namespace scope.
    fn element(
        &mut self,
        start: &BytesStart<'_>,
        self_closing: bool,
        position: u64,
    ) -> Result<usize, ParseError> {
        let raw_start = from_utf8(start)?.to_owned();
        let name = from_utf8(start.name().as_ref())?.to_owned();

        let mut attributes = Vec::new();
        let mut declared = Vec::new();
        for attribute in start.attributes() {
            let attribute =
                attribute.map_err(|source| ParseError::Attribute { position, source })?;
            let key = from_utf8(attribute.key.as_ref())?.to_owned();
            let raw_value = entities::normalize(from_utf8(&attribute.value)?);
            let value = quick_xml::escape::unescape(&raw_value)
                .map_err(|source| ParseError::Escape { position, source })?
                .into_owned();
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.push((prefix.to_owned(), value.clone()));
            }
            attributes.push((key, value));
        }
        self.scopes.push(declared);

        let namespace = self.resolve(split_qname(&name).0);
        let attributes = attributes
            .into_iter()
            .map(|(name, value)| {
                let namespace = if is_declaration(&name) {
                    None
                } else {
                    self.resolve(split_qname(&name).0)
                };
                Attribute {
                    name,
                    namespace,
                    value,
                }
            })
            .collect();

        Ok(self.document.push(NodeData::Element(Element {
            name,
            namespace,
            attributes,
            raw_start: Some(raw_start),
            raw_end: None,
            self_closing,
        })))
    }

    /// Resolve a prefix through the open scopes, innermost first.
    fn resolve(&self, prefix: Option<&str>) -> Option<String> {
        let prefix = prefix?;
        self.scopes
            .iter()
            .rev()
            .flatten()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .or_else(|| self.document.namespaces.resolve(prefix).map(str::to_owned))
    }

    fn push_leaf(&mut self, data: NodeData) {
        let index = self.document.push(data);
        self.document.attach(self.current(), index);
    }

    fn flush_text(&mut self) {
        if let Some(run) = self.text.take() {
            self.push_leaf(NodeData::Text {
                raw: run.raw,
                value: run.value,
            });
        }
    }

    fn finish(mut self) -> Result<Document, ParseError> {
        self.flush_text();
        if self.stack.len() > 1 {
            let open = self.current();
            let name = self
                .document
                .element_at(open)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            return Err(ParseError::Unclosed(name));
        }
        Ok(self.document)
    }
}

/// Source text between two reader offsets.
fn span(source: &str, from: u64, to: u64) -> &str {
    let (Ok(from), Ok(to)) = (usize::try_from(from), usize::try_from(to)) else {
        return "";
    };
    source.get(from..to).unwrap_or_default()
}

fn is_allowed_char(ch: char) -> bool {
    matches!(ch, '\t' | '\n' | '\r')
        || (ch >= '\u{20}' && !matches!(ch, '\u{fffe}' | '\u{ffff}'))
}

fn check_characters(text: &str, position: u64) -> Result<(), ParseError> {
    match text.chars().find(|&ch| !is_allowed_char(ch)) {
        Some(ch) => Err(ParseError::InvalidCharacter {
            code: u32::from(ch),
            position,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::NodeType;

    #[test]
    fn test_parse_multiple_top_level_siblings() {
        let doc = Document::parse("<p>one</p>text<p>two</p>").unwrap();
        let children = doc.children(doc.root());
        assert_eq!(children.len(), 3);
        assert_eq!(doc.node_type(children[1]), Some(NodeType::Text));
        assert_eq!(doc.name(doc.root()), Some("xml"));
    }

    #[test]
    fn test_parse_nbsp_entity() {
        let doc = Document::parse("<p>a&nbsp;b</p>").unwrap();
        let p = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(p), "a\u{a0}b");
    }

    #[test]
    fn test_parse_decodes_attribute_values() {
        let doc = Document::parse(r#"<a href="x?a=1&amp;b=2">l</a>"#).unwrap();
        let a = doc.children(doc.root())[0];
        assert_eq!(doc.attribute(a, "href"), Some("x?a=1&b=2"));
    }

    #[test]
    fn test_parse_named_entity_in_attribute() {
        let doc = Document::parse(r#"<ri:page ri:content-title="A&nbsp;B" />"#).unwrap();
        let page = doc.children(doc.root())[0];
        assert_eq!(doc.attribute(page, "ri:content-title"), Some("A\u{a0}B"));
    }

    #[test]
    fn test_parse_keeps_cdata_verbatim() {
        let doc = Document::parse("<![CDATA[a&nbsp;b &bogus;]]>").unwrap();
        let block = doc.children(doc.root())[0];
        assert_eq!(doc.text_content(block), "a&nbsp;b &bogus;");
    }

    #[test]
    fn test_parse_rejects_unknown_entity() {
        let err = Document::parse("<p>&bogus;</p>").unwrap_err();
        assert!(matches!(err, ParseError::UndefinedEntity { ref name, .. } if name == "bogus"));
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        let err = Document::parse("<p><b>x</p></b>").unwrap_err();
        assert!(matches!(err, ParseError::Xml { .. }));
    }

    #[test]
    fn test_parse_rejects_unclosed_element() {
        let err = Document::parse("<p>open").unwrap_err();
        assert!(matches!(err, ParseError::Unclosed(ref name) if name == "p"));
    }

    #[test]
    fn test_parse_rejects_stray_wrapper_close() {
        let err = Document::parse("<p></p></xml><p></p>").unwrap_err();
        assert!(matches!(err, ParseError::Misplaced(_)));
    }

    #[test]
    fn test_parse_rejects_declaration() {
        let err = Document::parse(r#"<?xml version="1.0"?><p/>"#).unwrap_err();
        assert!(matches!(err, ParseError::Misplaced(_)));
    }

    #[test]
    fn test_parse_rejects_control_character_reference() {
        let err = Document::parse("<p>&#1;</p>").unwrap_err();
        assert!(matches!(err, ParseError::InvalidCharacter { code: 1, .. }));
    }

    #[test]
    fn test_parse_honours_inner_declarations() {
        let doc = Document::parse(r#"<x:item xmlns:x="urn:example"><x:leaf/></x:item>"#).unwrap();
        let item = doc.children(doc.root())[0];
        let leaf = doc.children(item)[0];
        assert_eq!(doc.namespace(item), Some("urn:example"));
        assert_eq!(doc.namespace(leaf), Some("urn:example"));
        assert!(doc.attributes(item)[0].is_declaration());
    }

    #[test]
    fn test_parse_keeps_comments_and_instructions() {
        let doc = Document::parse("<!-- note --><?pi data?><p/>").unwrap();
        let types: Vec<_> = doc
            .children(doc.root())
            .into_iter()
            .filter_map(|id| doc.node_type(id))
            .collect();
        assert_eq!(
            types,
            vec![NodeType::Comment, NodeType::ProcessingInstruction, NodeType::Element]
        );
    }
}
