//! Mounting widgets into the live page.

use serde_json::Value;
use tracing::debug;
use wv_correlate::Bundle;
use wv_dom::{DomError, LiveDocument, NodeId};
use wv_xhtml::Document;

use crate::widget::Widget;

/// Mount `bundle`'s widget directly before its anchor.
///
/// With `hide_anchor` the anchor gets `display: none`; it is never removed.
/// The widget receives its own props plus the markup of the source node it
/// came from under `source`. Each call mounts a new widget, so rendering the
/// same anchor twice yields two widgets.
pub fn render(
    live: &mut LiveDocument,
    source: &Document,
    bundle: &Bundle<Widget>,
    hide_anchor: bool,
) -> Result<NodeId, DomError> {
    let anchor = bundle.anchor;
    let parent = live.parent(anchor).ok_or(DomError::NotAChild)?;

    if hide_anchor {
        live.hide(anchor)?;
    }

    let mut props = bundle.widget.props();
    if let Value::Object(map) = &mut props {
        map.insert(
            "source".to_owned(),
            Value::String(source.serialize_node(bundle.source)),
        );
    }

    let element = bundle.widget.build(live, &props)?;
    live.insert_before(parent, element, Some(anchor))?;
    debug!(widget = bundle.widget.name(), "Mounted widget");
    Ok(element)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::widget::DngArtifact;

    fn setup() -> (LiveDocument, Document, Bundle<Widget>) {
        let live = LiveDocument::parse(r#"<p>see <a href="https://dng/1">REQ</a> here</p>"#).unwrap();
        let source = Document::parse(r#"<p>see <a href="https://dng/1">REQ</a> here</p>"#).unwrap();
        let anchor = live
            .query_selector(live.document_node(), "a")
            .unwrap()
            .unwrap();
        let node = source.select_one(".//a").unwrap().unwrap();
        let bundle = Bundle {
            widget: Widget::DngArtifact(DngArtifact {
                href: "https://dng/1".to_owned(),
                label: "REQ".to_owned(),
            }),
            anchor,
            source: node,
        };
        (live, source, bundle)
    }

    #[test]
    fn test_render_hides_anchor_and_mounts_before_it() {
        let (mut live, source, bundle) = setup();
        let widget = render(&mut live, &source, &bundle, true).unwrap();

        let parent = live.parent(bundle.anchor).unwrap();
        let children = live.children(parent).to_vec();
        let position = children.iter().position(|&c| c == bundle.anchor).unwrap();
        assert_eq!(children[position - 1], widget);
        assert!(live.is_hidden(bundle.anchor));
        assert!(live.is_connected(bundle.anchor));

        let props: Value =
            serde_json::from_str(live.get_attribute(widget, "data-props").unwrap()).unwrap();
        assert_eq!(props["source"], r#"<a href="https://dng/1">REQ</a>"#);
        assert_eq!(props["label"], "REQ");
    }

    #[test]
    fn test_render_without_hiding() {
        let (mut live, source, bundle) = setup();
        render(&mut live, &source, &bundle, false).unwrap();
        assert!(!live.is_hidden(bundle.anchor));
    }

    #[test]
    fn test_render_twice_mounts_twice() {
        let (mut live, source, bundle) = setup();
        render(&mut live, &source, &bundle, true).unwrap();
        render(&mut live, &source, &bundle, true).unwrap();

        let widgets = live
            .query_selector_all(live.document_node(), ".wv-dng-artifact")
            .unwrap();
        assert_eq!(widgets.len(), 2);
        assert_eq!(
            live.query_selector_all(live.document_node(), r#"a[href="https://dng/1"]"#)
                .unwrap()
                .len(),
            3
        );
        assert_eq!(live.get_attribute(bundle.anchor, "style"), Some("display: none;"));
    }

    #[test]
    fn test_render_detached_anchor_fails() {
        let (mut live, source, mut bundle) = setup();
        bundle.anchor = live.create_element("a");
        assert_eq!(
            render(&mut live, &source, &bundle, true),
            Err(DomError::NotAChild)
        );
    }
}
