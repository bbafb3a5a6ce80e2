//! Lenient HTML tokenizer and serializer.

use quick_xml::escape::{escape, partial_escape};
use tracing::debug;
use wv_xhtml::entities::decode_html;

use crate::error::DomError;
use crate::tree::{Element, LiveDocument, NodeId, NodeType};

/// Elements whose content is raw text up to the matching end tag.
const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_end_tag_ignore_case(bytes: &[u8], from: usize, tag: &str) -> Option<usize> {
    let needle = format!("</{tag}");
    let lower: Vec<u8> = bytes.get(from..)?.to_ascii_lowercase();
    find_subslice(&lower, 0, needle.as_bytes()).map(|offset| from + offset)
}

struct StartTag {
    tag: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    next: usize,
}

fn parse_start_tag(html: &str, at: usize) -> Result<StartTag, DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(DomError::HtmlParse(format!("unclosed start tag <{tag}>")));
        }
        if bytes[i] == b'>' {
            i += 1;
            break;
        }
        if bytes[i] == b'/' {
            i += 1;
            if bytes.get(i) == Some(&b'>') {
                self_closing = true;
                i += 1;
                break;
            }
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if name_start == i {
            // Stray quote or '=': skip it.
            i += 1;
            continue;
        }
        let name = html[name_start..i].to_ascii_lowercase();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(html, &mut i)?
        } else {
            String::new()
        };

        // First occurrence wins, as in browsers.
        if !attrs.iter().any(|(existing, _)| *existing == name) {
            attrs.push((name, value));
        }
    }

    Ok(StartTag {
        tag,
        attrs,
        self_closing,
        next: i,
    })
}

fn parse_attr_value(html: &str, i: &mut usize) -> Result<String, DomError> {
    let bytes = html.as_bytes();
    match bytes.get(*i) {
        Some(&quote @ (b'"' | b'\'')) => {
            *i += 1;
            let start = *i;
            while *i < bytes.len() && bytes[*i] != quote {
                *i += 1;
            }
            if *i >= bytes.len() {
                return Err(DomError::HtmlParse("unclosed quoted attribute value".to_owned()));
            }
            let value = decode_html(&html[start..*i]).into_owned();
            *i += 1;
            Ok(value)
        }
        Some(_) => {
            let start = *i;
            while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
                *i += 1;
            }
            Ok(decode_html(&html[start..*i]).into_owned())
        }
        None => Err(DomError::HtmlParse("missing attribute value".to_owned())),
    }
}

fn parse_end_tag(html: &str, at: usize) -> Result<(String, usize), DomError> {
    let bytes = html.as_bytes();
    let mut i = at + 2;
    skip_ws(bytes, &mut i);
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = html[tag_start..i].to_ascii_lowercase();
    match find_subslice(bytes, i, b">") {
        Some(end) => Ok((tag, end + 1)),
        None => Err(DomError::HtmlParse(format!("unclosed end tag </{tag}>"))),
    }
}

impl LiveDocument {
    /// Parse an HTML document or fragment.
    pub fn parse(html: &str) -> Result<Self, DomError> {
        let mut dom = Self::new();
        let root = dom.root;
        dom.parse_into(html, root)?;
        debug!(nodes = dom.nodes.len(), "Parsed live document");
        Ok(dom)
    }

    /// Parse a fragment into detached top-level nodes of this document.
    pub fn parse_fragment(&mut self, html: &str) -> Result<Vec<NodeId>, DomError> {
        let holder = self.create_element("template");
        self.parse_into(html, holder)?;
        let nodes = self.children(holder).to_vec();
        for &node in &nodes {
            self.nodes[node.0].parent = None;
        }
        self.nodes[holder.0].children.clear();
        Ok(nodes)
    }

    fn parse_into(&mut self, html: &str, container: NodeId) -> Result<(), DomError> {
        let bytes = html.as_bytes();
        let mut stack = vec![container];
        let mut i = 0;

        while i < bytes.len() {
            let parent = stack.last().copied().unwrap_or(container);

            if bytes[i..].starts_with(b"<!--") {
                let end = find_subslice(bytes, i + 4, b"-->")
                    .ok_or_else(|| DomError::HtmlParse("unclosed HTML comment".to_owned()))?;
                self.push(Some(parent), NodeType::Comment(html[i + 4..end].to_owned()));
                i = end + 3;
                continue;
            }

            if bytes[i..].starts_with(b"<!") || bytes[i..].starts_with(b"<?") {
                let end = find_subslice(bytes, i, b">")
                    .ok_or_else(|| DomError::HtmlParse("unclosed declaration".to_owned()))?;
                let body = &html[i + 2..end];
                if let Some(doctype) = body
                    .get(..7)
                    .filter(|prefix| prefix.eq_ignore_ascii_case("doctype"))
                    .map(|_| body[7..].trim())
                {
                    self.push(Some(parent), NodeType::Doctype(doctype.to_owned()));
                }
                i = end + 1;
                continue;
            }

            if bytes[i..].starts_with(b"</") && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic) {
                let (tag, next) = parse_end_tag(html, i)?;
                i = next;
                // Close up to the nearest open element with this name.
                if let Some(position) = stack
                    .iter()
                    .skip(1)
                    .rposition(|&open| self.tag_name(open) == Some(tag.as_str()))
                {
                    stack.truncate(position + 1);
                }
                continue;
            }

            if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
                let start = parse_start_tag(html, i)?;
                i = start.next;
                let node = self.push(
                    Some(parent),
                    NodeType::Element(Element {
                        tag_name: start.tag.clone(),
                        attrs: start.attrs,
                    }),
                );

                if RAW_TEXT_TAGS.contains(&start.tag.as_str()) && !start.self_closing {
                    let close = find_end_tag_ignore_case(bytes, i, &start.tag).unwrap_or(bytes.len());
                    if close > i {
                        self.push(Some(node), NodeType::Text(html[i..close].to_owned()));
                    }
                    i = match parse_end_tag(html, close) {
                        Ok((_, next)) if close < bytes.len() => next,
                        _ => bytes.len(),
                    };
                    continue;
                }

                if !start.self_closing && !is_void_tag(&start.tag) {
                    stack.push(node);
                }
                continue;
            }

            // Text up to the next tag-like '<'.
            let text_start = i;
            i += 1;
            while i < bytes.len()
                && !(bytes[i] == b'<'
                    && bytes
                        .get(i + 1)
                        .is_some_and(|&b| b.is_ascii_alphabetic() || b == b'/' || b == b'!' || b == b'?'))
            {
                i += 1;
            }
            let text = decode_html(&html[text_start..i]).into_owned();
            self.push(Some(parent), NodeType::Text(text));
        }
        Ok(())
    }

    /// Serialize the whole document.
    #[must_use]
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    /// Serialize a node including its own tag.
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Serialize the children of a node.
    #[must_use]
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.node_type {
            NodeType::Document => {
                for &child in &node.children {
                    self.write_node(child, out);
                }
            }
            NodeType::Doctype(doctype) => {
                out.push_str("<!DOCTYPE ");
                out.push_str(doctype);
                out.push('>');
            }
            NodeType::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(comment);
                out.push_str("-->");
            }
            NodeType::Text(text) => {
                let raw_parent = node
                    .parent
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag));
                if raw_parent {
                    out.push_str(text);
                } else {
                    out.push_str(&partial_escape(text.as_str()));
                }
            }
            NodeType::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value.as_str()));
                    out.push('"');
                }
                out.push('>');
                if is_void_tag(&element.tag_name) {
                    return;
                }
                for &child in &node.children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_tag_soup() {
        let dom = LiveDocument::parse("<div><p>one<p>two</div><br><img src=x.png alt>").unwrap();
        assert_eq!(
            dom.to_html(),
            r#"<div><p>one<p>two</p></p></div><br><img src="x.png" alt="">"#
        );
    }

    #[test]
    fn test_stray_end_tags_are_dropped() {
        let dom = LiveDocument::parse("<p>a</span>b</p>").unwrap();
        assert_eq!(dom.to_html(), "<p>ab</p>");
    }

    #[test]
    fn test_entities_are_decoded() {
        let dom = LiveDocument::parse(r#"<a href="/x?a=1&amp;b=2" title='&quot;q&quot;'>A&nbsp;&amp;&nbsp;B</a>"#).unwrap();
        let a = dom.query_selector(dom.document_node(), "a").unwrap().unwrap();
        assert_eq!(dom.get_attribute(a, "href"), Some("/x?a=1&b=2"));
        assert_eq!(dom.get_attribute(a, "title"), Some("\"q\""));
        assert_eq!(dom.text_content(a), "A\u{a0}&\u{a0}B");
    }

    #[test]
    fn test_bare_less_than_is_text() {
        let dom = LiveDocument::parse("<p>1 < 2 & 3</p>").unwrap();
        assert_eq!(dom.to_html(), "<p>1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn test_script_content_is_raw() {
        let html = "<script>if (a < b && c) { x(\"</p>\"); }</script><p>x</p>";
        let dom = LiveDocument::parse(html).unwrap();
        assert_eq!(dom.to_html(), html);
    }

    #[test]
    fn test_doctype_and_comments_survive() {
        let html = "<!DOCTYPE html><html><body><!-- c --><p>x</p></body></html>";
        let dom = LiveDocument::parse(html).unwrap();
        assert_eq!(dom.to_html(), html);
    }

    #[test]
    fn test_uppercase_tags_are_lowered() {
        let dom = LiveDocument::parse("<DIV ID=main>x</DIV>").unwrap();
        assert_eq!(dom.to_html(), r#"<div id="main">x</div>"#);
    }

    #[test]
    fn test_parse_fragment_returns_detached_nodes() {
        let mut dom = LiveDocument::parse("<p></p>").unwrap();
        let nodes = dom.parse_fragment("<span>a</span>b").unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|&n| dom.parent(n).is_none()));
        assert_eq!(dom.outer_html(nodes[0]), "<span>a</span>");
    }

    #[test]
    fn test_unclosed_comment_is_an_error() {
        assert!(matches!(
            LiveDocument::parse("<p><!-- open"),
            Err(DomError::HtmlParse(_))
        ));
    }
}
