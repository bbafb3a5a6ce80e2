//! Directive registry.
//!
//! Every directive is one of two closed shapes. Page directives are keyed by
//! the title of the page they link to and match both a `ri:page` reference and
//! an absolute link to that page. Pattern directives carry their own storage
//! query and live selector.

use serde_json::Value;
use wv_config::{Config, WidgetKind};
use wv_correlate::{Descriptor, ElementSnapshot};
use wv_xhtml::{Document, NodeId};

use crate::context::{PageContext, new_uuid};
use crate::queries;
use crate::store::StoreError;
use crate::widget::{DngArtifact, QueryTable, Widget};
use crate::writeback::{active_state, active_uuid};

/// Name of the built-in DOORS Next link directive.
pub const DNG_DIRECTIVE: &str = "dng-artifact";

/// Record derived from a source node before its widget is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub label: String,
    /// Uuid of an enclosing activated span.
    pub uuid: Option<String>,
    /// Widget state embedded in that span.
    pub state: Option<Value>,
}

impl Extracted {
    fn new(doc: &Document, node: NodeId, view_prefix: &str, label: String) -> Self {
        let uuid = active_uuid(doc, node, view_prefix);
        let state = uuid
            .as_ref()
            .and_then(|_| active_state(doc, node, view_prefix));
        Self { label, uuid, state }
    }
}

/// Factory output.
pub type WidgetResult = Result<Widget, StoreError>;

/// Descriptor type produced by the registry.
pub type DirectiveDescriptor<'a> = Descriptor<'a, Extracted, WidgetResult>;

/// Directive linked to a page by title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDirective {
    pub title: String,
    pub widget: WidgetKind,
}

impl PageDirective {
    /// Absolute URL of the page in the current space.
    pub fn absolute_href(&self, context: &PageContext) -> String {
        format!(
            "{}{}",
            context.page.base_url.trim_end_matches('/'),
            queries::display_path(&context.page.space_key, &self.title)
        )
    }

    /// `ri:page` references, paired with the site-relative links Confluence renders for them.
    pub fn reference_descriptor<'a>(&'a self, context: &'a PageContext) -> DirectiveDescriptor<'a> {
        let space_key = &context.page.space_key;
        let href = queries::display_path(space_key, &self.title);
        Descriptor::new(
            queries::page_reference_storage(space_key, &self.title),
            queries::link_live(&href),
            move |element: &ElementSnapshot, extracted: Option<&Extracted>| {
                build_widget(self.widget, context, element, extracted)
            },
        )
        .with_extract(move |doc: &Document, node: NodeId, _: &ElementSnapshot| {
            let label = doc
                .parent(node)
                .filter(|&parent| doc.name(parent) == Some("ac:link"))
                .map(|parent| doc.text_content(parent))
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| self.title.clone());
            Extracted::new(doc, node, &context.view_prefix, label)
        })
    }

    /// Plain anchors holding the page's absolute URL.
    pub fn link_descriptor<'a>(&'a self, context: &'a PageContext) -> DirectiveDescriptor<'a> {
        let href = self.absolute_href(context);
        Descriptor::new(
            queries::link_storage(&href),
            queries::link_live(&href),
            move |element: &ElementSnapshot, extracted: Option<&Extracted>| {
                build_widget(self.widget, context, element, extracted)
            },
        )
        .with_extract(move |doc: &Document, node: NodeId, _: &ElementSnapshot| {
            let text = doc.text_content(node);
            let label = if text.trim().is_empty() {
                self.title.clone()
            } else {
                text
            };
            Extracted::new(doc, node, &context.view_prefix, label)
        })
    }
}

/// Directive declared as a storage query and live selector pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDirective {
    pub name: String,
    pub widget: WidgetKind,
    /// Storage query without the active-directive exclusion.
    pub storage: String,
    pub live: String,
}

impl PatternDirective {
    /// Built-in directive for links into DOORS Next.
    pub fn dng(prefix: &str) -> Self {
        Self {
            name: DNG_DIRECTIVE.to_owned(),
            widget: WidgetKind::DngArtifact,
            storage: format!(".//a[starts-with(@href,{})]", wv_xhtml::xpath::literal(prefix)),
            live: queries::link_prefix_live(prefix),
        }
    }

    /// Storage query restricted to nodes outside activated directives.
    pub fn storage_query(&self, view_prefix: &str) -> String {
        let exclude = queries::exclude_active(view_prefix);
        if is_location_path(&self.storage) {
            format!("{}{exclude}", self.storage)
        } else {
            format!("({}){exclude}", self.storage)
        }
    }

    pub fn descriptor<'a>(&'a self, context: &'a PageContext) -> DirectiveDescriptor<'a> {
        Descriptor::new(
            self.storage_query(&context.view_prefix),
            self.live.clone(),
            move |element: &ElementSnapshot, extracted: Option<&Extracted>| {
                build_widget(self.widget, context, element, extracted)
            },
        )
    }
}

/// Whether a predicate can be appended to `query` directly.
fn is_location_path(query: &str) -> bool {
    let mut depth = 0i32;
    let mut quote = None;
    for c in query.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, '|') if depth == 0 => return false,
            (None, ' ') if depth == 0 => return false,
            _ => {}
        }
    }
    true
}

fn build_widget(
    kind: WidgetKind,
    context: &PageContext,
    element: &ElementSnapshot,
    extracted: Option<&Extracted>,
) -> WidgetResult {
    let label = extracted.map_or_else(
        || element.text.trim().to_owned(),
        |extracted| extracted.label.clone(),
    );
    match kind {
        WidgetKind::QueryTable => {
            let uuid = extracted
                .and_then(|extracted| extracted.uuid.clone())
                .unwrap_or_else(new_uuid);
            let embedded = extracted.and_then(|extracted| extracted.state.clone());
            QueryTable::load(context, uuid, label, embedded).map(Widget::QueryTable)
        }
        WidgetKind::DngArtifact => Ok(Widget::DngArtifact(DngArtifact {
            href: element.attribute("href").unwrap_or_default().to_owned(),
            label,
        })),
    }
}

/// A registered directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Page(PageDirective),
    Pattern(PatternDirective),
}

impl Directive {
    pub fn name(&self) -> &str {
        match self {
            Self::Page(page) => &page.title,
            Self::Pattern(pattern) => &pattern.name,
        }
    }

    /// Descriptors to correlate, all before any bundle is rendered.
    pub fn descriptors<'a>(&'a self, context: &'a PageContext) -> Vec<DirectiveDescriptor<'a>> {
        match self {
            Self::Page(page) => vec![
                page.reference_descriptor(context),
                page.link_descriptor(context),
            ],
            Self::Pattern(pattern) => vec![pattern.descriptor(context)],
        }
    }
}

/// Ordered set of directives: page directives first, then patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    directives: Vec<Directive>,
}

impl Registry {
    pub fn from_config(config: &Config) -> Self {
        let pages = config.directives.page.iter().map(|page| {
            Directive::Page(PageDirective {
                title: page.title.clone(),
                widget: page.widget,
            })
        });
        let dng = config
            .dng
            .as_ref()
            .map(|dng| Directive::Pattern(PatternDirective::dng(&dng.prefix)));
        let patterns = config.directives.pattern.iter().map(|pattern| {
            Directive::Pattern(PatternDirective {
                name: pattern.name.clone(),
                widget: pattern.widget,
                storage: pattern.storage.clone(),
                live: pattern.live.clone(),
            })
        });
        Self {
            directives: pages.chain(dng).chain(patterns).collect(),
        }
    }

    #[must_use]
    pub fn with(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    pub fn len(&self) -> usize {
        self.directives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wv_config::{DngConfig, PatternDirectiveConfig};
    use wv_correlate::correlate;
    use wv_dom::LiveDocument;

    use super::*;
    use crate::host::{DocumentHandle, PageMeta};
    use crate::store::ObjectStore;

    fn context() -> PageContext {
        PageContext {
            page: PageMeta {
                page_id: "42".to_owned(),
                title: "Home".to_owned(),
                space_key: "ENG".to_owned(),
                base_url: "https://wiki.example.com".to_owned(),
            },
            document: DocumentHandle {
                page_id: "1".to_owned(),
                title: "Spec".to_owned(),
            },
            store: ObjectStore::new(json!({}), json!({}), json!({})),
            view_prefix: "ve4".to_owned(),
        }
    }

    fn table_directive() -> PageDirective {
        PageDirective {
            title: "CAE CED Table Element".to_owned(),
            widget: WidgetKind::QueryTable,
        }
    }

    fn widgets(
        source: &Document,
        live: &LiveDocument,
        descriptor: DirectiveDescriptor<'_>,
    ) -> Vec<Widget> {
        correlate(source, live, live.document_node(), descriptor)
            .unwrap()
            .map(|bundle| bundle.widget.unwrap())
            .collect()
    }

    fn label(widget: &Widget) -> &str {
        match widget {
            Widget::QueryTable(table) => &table.label,
            Widget::DngArtifact(artifact) => &artifact.label,
        }
    }

    #[test]
    fn test_registry_from_config_orders_pages_then_patterns() {
        let mut config = Config::default();
        config.dng = Some(DngConfig {
            prefix: "https://dng/rm/".to_owned(),
        });
        config.directives.pattern.push(PatternDirectiveConfig {
            name: "jira".to_owned(),
            widget: WidgetKind::DngArtifact,
            storage: ".//a".to_owned(),
            live: "a".to_owned(),
        });

        let registry = Registry::from_config(&config);
        let names: Vec<&str> = registry.directives().iter().map(Directive::name).collect();
        assert_eq!(names, vec!["CAE CED Table Element", DNG_DIRECTIVE, "jira"]);
    }

    #[test]
    fn test_page_reference_label_from_link_body() {
        let context = context();
        let directive = table_directive();
        let source = Document::parse(concat!(
            r#"<p><ac:link><ri:page ri:content-title="CAE CED Table Element" />"#,
            r#"<ac:plain-text-link-body><![CDATA[Requirements]]></ac:plain-text-link-body></ac:link>"#,
            r#"<ac:link><ri:page ri:space-key="ENG" ri:content-title="CAE CED Table Element" /></ac:link>"#,
            r#"<ac:link><ri:page ri:space-key="OPS" ri:content-title="CAE CED Table Element" /></ac:link></p>"#
        ))
        .unwrap();
        let live = LiveDocument::parse(concat!(
            r#"<p><a href="/display/ENG/CAE+CED+Table+Element">Requirements</a>"#,
            r#"<a href="/display/ENG/CAE+CED+Table+Element">CAE CED Table Element</a>"#,
            r#"<a href="/display/OPS/CAE+CED+Table+Element">other space</a></p>"#
        ))
        .unwrap();

        let widgets = widgets(&source, &live, directive.reference_descriptor(&context));
        assert_eq!(
            widgets.iter().map(label).collect::<Vec<_>>(),
            vec!["Requirements", "CAE CED Table Element"]
        );
    }

    #[test]
    fn test_absolute_link_label_and_fallback() {
        let context = context();
        let directive = table_directive();
        let href = "https://wiki.example.com/display/ENG/CAE+CED+Table+Element";
        let source = Document::parse(&format!(
            r#"<p><a href="{href}">My table</a><a href="{href}"> </a></p>"#
        ))
        .unwrap();
        let live =
            LiveDocument::parse(&format!(r#"<a href="{href}">My table</a><a href="{href}"> </a>"#))
                .unwrap();

        let widgets = widgets(&source, &live, directive.link_descriptor(&context));
        assert_eq!(
            widgets.iter().map(label).collect::<Vec<_>>(),
            vec!["My table", "CAE CED Table Element"]
        );
    }

    #[test]
    fn test_query_table_reuses_active_uuid() {
        let context = context();
        let directive = table_directive();
        let source = Document::parse(concat!(
            r#"<ac:structured-macro ac:name="span"><ac:parameter ac:name="id">ve4-abc_1</ac:parameter>"#,
            r#"<ac:rich-text-body><ac:link><ri:page ri:content-title="CAE CED Table Element" /></ac:link>"#,
            r#"</ac:rich-text-body></ac:structured-macro><ac:link><ri:page ri:content-title="CAE CED Table Element" /></ac:link>"#
        ))
        .unwrap();
        let live = LiveDocument::parse(
            r#"<a href="/display/ENG/CAE+CED+Table+Element">a</a><a href="/display/ENG/CAE+CED+Table+Element">b</a>"#,
        )
        .unwrap();

        let widgets = widgets(&source, &live, directive.reference_descriptor(&context));
        let uuids: Vec<&str> = widgets.iter().filter_map(Widget::uuid).collect();
        assert_eq!(uuids.len(), 2);
        assert_eq!(uuids[0], "abc_1");
        assert_ne!(uuids[1], "abc_1");
        assert!(
            context
                .store
                .get("page#elements.serialized.queryTable.abc_1")
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_query_table_restores_embedded_state() {
        let context = context();
        let directive = table_directive();
        let state = json!({"uuid": "abc_2", "parameterValues": {"x": 2}});
        let source = Document::parse(&format!(
            concat!(
                r#"<ac:structured-macro ac:name="span"><ac:parameter ac:name="id">ve4-abc_2</ac:parameter>"#,
                r#"<ac:plain-text-body><![CDATA[{}]]></ac:plain-text-body>"#,
                r#"<ac:rich-text-body><ac:link><ri:page ri:content-title="CAE CED Table Element" /></ac:link>"#,
                r#"</ac:rich-text-body></ac:structured-macro>"#
            ),
            state
        ))
        .unwrap();
        let live =
            LiveDocument::parse(r#"<a href="/display/ENG/CAE+CED+Table+Element">a</a>"#).unwrap();

        let widgets = widgets(&source, &live, directive.reference_descriptor(&context));
        let [Widget::QueryTable(table)] = widgets.as_slice() else {
            panic!("expected one query table, got {widgets:?}");
        };
        assert_eq!(table.state, state);
        assert_eq!(
            context
                .store
                .get("page#elements.serialized.queryTable.abc_2")
                .unwrap(),
            Some(state)
        );
    }

    #[test]
    fn test_dng_pattern_skips_active_directives() {
        let context = context();
        let directive = PatternDirective::dng("https://dng/rm/");
        let source = Document::parse(concat!(
            r#"<p><a href="https://dng/rm/1">REQ-1</a></p>"#,
            r#"<ac:structured-macro ac:name="span"><ac:parameter ac:name="id">ve4-u_1</ac:parameter>"#,
            r#"<ac:rich-text-body><a href="https://dng/rm/2">REQ-2</a></ac:rich-text-body></ac:structured-macro>"#
        ))
        .unwrap();
        // The activated link renders inside the widget, so only one plain link is live.
        let live = LiveDocument::parse(r#"<p><a href="https://dng/rm/1"> REQ-1 </a></p>"#).unwrap();

        let widgets = widgets(&source, &live, directive.descriptor(&context));
        assert_eq!(
            widgets,
            vec![Widget::DngArtifact(DngArtifact {
                href: "https://dng/rm/1".to_owned(),
                label: "REQ-1".to_owned(),
            })]
        );
    }

    #[test]
    fn test_storage_query_wraps_unions() {
        let pattern = PatternDirective {
            name: "x".to_owned(),
            widget: WidgetKind::DngArtifact,
            storage: ".//a | .//b".to_owned(),
            live: "a, b".to_owned(),
        };
        assert!(pattern.storage_query("ve4").starts_with("(.//a | .//b)[not("));

        let pattern = PatternDirective {
            storage: r#".//a[@title="x | y"]"#.to_owned(),
            ..pattern
        };
        assert!(pattern.storage_query("ve4").starts_with(r#".//a[@title="x | y"][not("#));
    }
}
