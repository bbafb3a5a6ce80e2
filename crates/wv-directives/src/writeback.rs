//! Activation of rendered directives in the page source.
//!
//! An activated directive is wrapped in a `span` structured macro whose `id`
//! parameter carries `<view prefix>-<uuid>`. Later runs reuse the uuid and
//! pattern directives skip everything inside such a span.

use serde_json::Value;
use uuid::Uuid;
use wv_xhtml::{Child, Document, NodeId, TreeError};

use crate::queries::active_span_ancestor;

/// Uuid of the activated span enclosing `node`, if any.
pub fn active_uuid(doc: &Document, node: NodeId, view_prefix: &str) -> Option<String> {
    let query = format!(
        r#"{}/ac:parameter[@ac:name="id"]"#,
        active_span_ancestor(view_prefix)
    );
    let parameter = doc.select_from(node, &query).ok()?.pop()?;
    let id = doc.text_content(parameter);
    let uuid = id.trim().strip_prefix(view_prefix)?.strip_prefix('-')?;
    (!uuid.is_empty()).then(|| uuid.to_owned())
}

/// Widget state embedded in the activated span enclosing `node`, if any.
pub fn active_state(doc: &Document, node: NodeId, view_prefix: &str) -> Option<Value> {
    let query = format!("{}/ac:plain-text-body", active_span_ancestor(view_prefix));
    let body = doc.select_from(node, &query).ok()?.pop()?;
    serde_json::from_str(&doc.text_content(body)).ok()
}

/// `id` parameter value marking an activated directive.
fn directive_id(view_prefix: &str, uuid: &str) -> String {
    format!("{view_prefix}-{uuid}")
}

/// Node that gets wrapped when `node` is activated.
///
/// A page reference is wrapped together with the `ac:link` around it.
pub fn activation_target(doc: &Document, node: NodeId) -> NodeId {
    match doc.parent(node) {
        Some(parent)
            if doc.name(node) == Some("ri:page") && doc.name(parent) == Some("ac:link") =>
        {
            parent
        }
        _ => node,
    }
}

/// Wrap `node` in an activated span macro.
///
/// Returns the new macro element, or `None` when the node is already inside
/// an activated span.
pub fn activate(
    doc: &mut Document,
    node: NodeId,
    view_prefix: &str,
    uuid: &str,
    state: Option<&Value>,
) -> Result<Option<NodeId>, TreeError> {
    if active_uuid(doc, node, view_prefix).is_some() {
        return Ok(None);
    }
    let target = activation_target(doc, node);
    let parent = doc.parent(target).ok_or(TreeError::InvalidChild)?;

    let id = doc.build(
        "ac:parameter",
        &[("ac:name", "id")],
        vec![Child::from(directive_id(view_prefix, uuid))],
    )?;
    let output_type = doc.build(
        "ac:parameter",
        &[("ac:name", "atlassian-macro-output-type")],
        vec![Child::from("INLINE")],
    )?;
    let mut children = vec![Child::from(id), Child::from(output_type)];
    if let Some(state) = state {
        let block = doc.create_text_block(&state.to_string());
        children.push(doc.build("ac:plain-text-body", &[], vec![Child::from(block)])?.into());
    }
    let body = doc.build("ac:rich-text-body", &[], Vec::new())?;
    children.push(body.into());

    let macro_id = Uuid::new_v4().to_string();
    let span = doc.build(
        "ac:structured-macro",
        &[
            ("ac:name", "span"),
            ("ac:schema-version", "1"),
            ("ac:macro-id", &macro_id),
        ],
        children,
    )?;

    doc.replace_child(parent, span, target)?;
    doc.append_child(body, target)?;
    Ok(Some(span))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_activate_plain_link() {
        let mut doc = Document::parse(r#"<p>see <a href="https://dng/1">REQ</a></p>"#).unwrap();
        let link = doc.select_one(".//a").unwrap().unwrap();

        let span = activate(&mut doc, link, "ve4", "u_1", None).unwrap().unwrap();
        let macro_id = doc.attribute(span, "ac:macro-id").unwrap().to_owned();

        assert_eq!(
            doc.serialize(),
            format!(
                concat!(
                    r#"<p>see <ac:structured-macro ac:name="span" ac:schema-version="1" ac:macro-id="{}">"#,
                    r#"<ac:parameter ac:name="id">ve4-u_1</ac:parameter>"#,
                    r#"<ac:parameter ac:name="atlassian-macro-output-type">INLINE</ac:parameter>"#,
                    r#"<ac:rich-text-body><a href="https://dng/1">REQ</a></ac:rich-text-body>"#,
                    r#"</ac:structured-macro></p>"#
                ),
                macro_id
            )
        );
        assert_eq!(active_uuid(&doc, link, "ve4").as_deref(), Some("u_1"));
    }

    #[test]
    fn test_activate_page_reference_wraps_link_and_embeds_state() {
        let mut doc = Document::parse(
            r#"<p><ac:link><ri:page ri:content-title="Table" /></ac:link></p>"#,
        )
        .unwrap();
        let page = doc.select_one(".//ri:page").unwrap().unwrap();

        activate(&mut doc, page, "ve4", "u_2", Some(&json!({"uuid": "u_2"})))
            .unwrap()
            .unwrap();

        let markup = doc.serialize();
        assert!(markup.contains(r#"<ac:plain-text-body><![CDATA[{"uuid":"u_2"}]]></ac:plain-text-body>"#));
        assert!(markup.contains(
            r#"<ac:rich-text-body><ac:link><ri:page ri:content-title="Table" /></ac:link></ac:rich-text-body>"#
        ));
        assert_eq!(active_uuid(&doc, page, "ve4").as_deref(), Some("u_2"));
        assert_eq!(active_state(&doc, page, "ve4"), Some(json!({"uuid": "u_2"})));
    }

    #[test]
    fn test_active_state_ignores_missing_or_invalid_body() {
        let mut doc = Document::parse(r#"<a href="x">x</a><b>y</b>"#).unwrap();
        let link = doc.select_one(".//a").unwrap().unwrap();
        activate(&mut doc, link, "ve4", "u_6", None).unwrap();
        assert_eq!(active_state(&doc, link, "ve4"), None);

        let doc = Document::parse(concat!(
            r#"<ac:structured-macro ac:name="span"><ac:parameter ac:name="id">ve4-u_7</ac:parameter>"#,
            r#"<ac:plain-text-body><![CDATA[not json]]></ac:plain-text-body>"#,
            r#"<ac:rich-text-body><a href="x">x</a></ac:rich-text-body></ac:structured-macro>"#
        ))
        .unwrap();
        let link = doc.select_one(".//a").unwrap().unwrap();
        assert_eq!(active_state(&doc, link, "ve4"), None);
    }

    #[test]
    fn test_activate_twice_is_a_no_op() {
        let mut doc = Document::parse(r#"<a href="x">x</a>"#).unwrap();
        let link = doc.select_one(".//a").unwrap().unwrap();
        activate(&mut doc, link, "ve4", "u_3", None).unwrap();
        let once = doc.serialize();

        assert_eq!(activate(&mut doc, link, "ve4", "u_4", None).unwrap(), None);
        assert_eq!(doc.serialize(), once);
    }

    #[test]
    fn test_active_uuid_requires_matching_prefix() {
        let doc = Document::parse(concat!(
            r#"<ac:structured-macro ac:name="span"><ac:parameter ac:name="id">other-u_5</ac:parameter>"#,
            r#"<ac:rich-text-body><a href="x">x</a></ac:rich-text-body></ac:structured-macro>"#
        ))
        .unwrap();
        let link = doc.select_one(".//a").unwrap().unwrap();
        assert_eq!(active_uuid(&doc, link, "ve4"), None);
        assert_eq!(active_uuid(&doc, link, "other").as_deref(), Some("u_5"));
    }
}
