//! Storage XPath and live selector construction.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use wv_xhtml::xpath::literal;

/// Characters kept verbatim in a `/display/` path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Encode a page title or space key for a `/display/` URL.
///
/// Spaces become `+`; other reserved characters are percent-encoded.
pub fn encode_segment(segment: &str) -> String {
    segment
        .split(' ')
        .map(|part| utf8_percent_encode(part, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// Site-relative URL of a page, as Confluence renders internal links.
pub fn display_path(space_key: &str, title: &str) -> String {
    format!(
        "/display/{}/{}",
        encode_segment(space_key),
        encode_segment(title)
    )
}

/// Storage query for `ri:page` references to `title` in `space_key` or the current space.
pub fn page_reference_storage(space_key: &str, title: &str) -> String {
    format!(
        ".//ri:page[@ri:space-key={} or not(@ri:space-key)][@ri:content-title={}]",
        literal(space_key),
        literal(title)
    )
}

/// Storage query for plain anchors pointing at `href`.
pub fn link_storage(href: &str) -> String {
    format!(".//a[@href={}]", literal(href))
}

/// Live selector for anchors pointing exactly at `href`.
pub fn link_live(href: &str) -> String {
    format!("a[href={}]", css_string(href))
}

/// Live selector for anchors whose `href` starts with `prefix`.
pub fn link_prefix_live(prefix: &str) -> String {
    format!("a[href^={}]", css_string(prefix))
}

/// Predicate rejecting nodes inside a span macro activated with `view_prefix`.
pub fn exclude_active(view_prefix: &str) -> String {
    format!("[not({})]", active_span_ancestor(view_prefix))
}

/// Path from a node to the nearest enclosing activated span macro.
pub fn active_span_ancestor(view_prefix: &str) -> String {
    format!(
        r#"ancestor::ac:structured-macro[@ac:name="span"][child::ac:parameter[@ac:name="id"][starts-with(text(),{})]]"#,
        literal(&format!("{view_prefix}-"))
    )
}

fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
