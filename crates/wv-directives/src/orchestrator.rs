//! One augmentation run over a page.
//!
//! `Init → FetchingContext → Ready`, or `Aborted` when the page is not part of
//! a tracked document. Configuration, parse, missing-source and
//! missing-document-metadata errors end the run with an error. A directive
//! that fails is recorded and the run moves on to the next directive.

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use wv_config::{Config, ConfigError, Messages};
use wv_correlate::{Bundle, CorrelationError, correlate};
use wv_dom::{LiveDocument, NodeId};
use wv_xhtml::Document;

use crate::context::{PageContext, new_uuid};
use crate::error::{DirectiveError, RunError};
use crate::host::{ContentSource, HostError};
use crate::registry::{Directive, Registry};
use crate::render::render;
use crate::status::{ErrorKind, Notice, StatusBar};
use crate::store::{ObjectStore, Scope};
use crate::writeback::activate;

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    FetchingContext,
    /// Context is complete and directives were processed.
    Ready,
    /// The page is not part of a tracked document; nothing was rendered.
    Aborted,
}

/// A directive whose processing stopped early.
#[derive(Debug)]
pub struct DirectiveFailure {
    pub directive: String,
    pub error: DirectiveError,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    pub phase: Phase,
    /// Number of widgets mounted.
    pub rendered: usize,
    pub failures: Vec<DirectiveFailure>,
    pub notices: Vec<Notice>,
    /// Page source, including any write-back.
    pub source: Option<Document>,
    /// Page scope of the object store after the run.
    pub page_metadata: Option<Value>,
}

/// Drives directive processing for one page.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    config: &'a Config,
    messages: Messages,
    registry: Registry,
}

impl<'a> Orchestrator<'a> {
    /// Prepare a run. Fails when the localization bundle lacks a required message.
    pub fn new(config: &'a Config) -> Result<Self, RunError> {
        let messages = config.messages()?;
        Ok(Self {
            config,
            messages,
            registry: Registry::from_config(config),
        })
    }

    /// Replace the registry built from configuration.
    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Augment `live` with widgets for every directive found in the page source.
    ///
    /// A run-level error is pushed to the status bar before it is returned.
    pub async fn run<H: ContentSource + ?Sized>(
        &self,
        host: &H,
        live: &mut LiveDocument,
    ) -> Result<RunOutcome, RunError> {
        debug!(phase = ?Phase::Init, page = %host.page().page_id, "Starting run");
        let mut status = StatusBar::mount(live, &self.config.live)?;

        match self.run_with_status(host, live, &mut status).await {
            Ok(mut outcome) => {
                outcome.notices = status.into_notices();
                Ok(outcome)
            }
            Err(err) => {
                error!(error = %err, "Run aborted");
                let notice = Notice::from_error(&self.messages, run_error_kind(&err), &[]);
                if let Err(dom_err) = status.push(live, notice) {
                    warn!(error = %dom_err, "Failed to show error notice");
                }
                Err(err)
            }
        }
    }

    async fn run_with_status<H: ContentSource + ?Sized>(
        &self,
        host: &H,
        live: &mut LiveDocument,
        status: &mut StatusBar,
    ) -> Result<RunOutcome, RunError> {
        info!(phase = ?Phase::FetchingContext, "Fetching page context");
        let (page_metadata, document, markup) = tokio::join!(
            host.page_metadata(true),
            host.document(),
            host.source_markup()
        );

        let page_metadata = match page_metadata {
            Ok(metadata) => metadata.unwrap_or_else(empty_object),
            Err(err) => {
                warn!(error = %err, "Page metadata unavailable");
                status.push(
                    live,
                    Notice::from_error(&self.messages, host_error_kind(&err), &[]),
                )?;
                empty_object()
            }
        };

        let Some(document) = document? else {
            info!(phase = ?Phase::Aborted, "Page is not part of a tracked document");
            return Ok(RunOutcome {
                phase: Phase::Aborted,
                rendered: 0,
                failures: Vec::new(),
                notices: Vec::new(),
                source: None,
                page_metadata: None,
            });
        };

        let markup = markup?.ok_or(RunError::MissingSource)?;
        let mut source = Document::parse(&markup)?;

        let document_metadata = host
            .document_metadata(&document)
            .await?
            .ok_or_else(|| RunError::MissingMetadata {
                document: document.title.clone(),
            })?;
        let hardcoded = serde_json::to_value(&self.config.hardcoded)
            .map_err(|e| ConfigError::Validation(format!("[hardcoded] is not representable: {e}")))?;

        let content_selector = &self.config.live.content_selector;
        let root = live
            .query_selector(live.document_node(), content_selector)?
            .ok_or_else(|| RunError::MissingContentRoot(content_selector.clone()))?;

        let context = PageContext {
            page: host.page().clone(),
            document,
            store: ObjectStore::new(page_metadata, document_metadata, hardcoded),
            view_prefix: self.config.directives.view_prefix.clone(),
        };

        info!(
            phase = ?Phase::Ready,
            document = %context.document.title,
            directives = self.registry.len(),
            "Processing directives"
        );

        let mut rendered = 0;
        let mut failures = Vec::new();
        for directive in self.registry.directives() {
            match self.process(directive, &context, &mut source, live, root) {
                Ok(count) => rendered += count,
                Err(err) => {
                    warn!(directive = directive.name(), error = %err, "Directive failed");
                    status.push(live, self.directive_notice(&err))?;
                    failures.push(DirectiveFailure {
                        directive: directive.name().to_owned(),
                        error: err,
                    });
                }
            }
        }

        info!(rendered, failed = failures.len(), "Run complete");
        Ok(RunOutcome {
            phase: Phase::Ready,
            rendered,
            failures,
            notices: Vec::new(),
            page_metadata: Some(context.store.scope(Scope::Page)),
            source: Some(source),
        })
    }

    /// Correlate all of a directive's descriptors, then render every bundle.
    fn process(
        &self,
        directive: &Directive,
        context: &PageContext,
        source: &mut Document,
        live: &mut LiveDocument,
        root: NodeId,
    ) -> Result<usize, DirectiveError> {
        let correlations = directive
            .descriptors(context)
            .into_iter()
            .map(|descriptor| correlate(&*source, &*live, root, descriptor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rendered = 0;
        for bundle in correlations.into_iter().flatten() {
            let bundle = Bundle {
                widget: bundle.widget?,
                anchor: bundle.anchor,
                source: bundle.source,
            };
            render(live, source, &bundle, true)?;

            if self.config.directives.writeback {
                let uuid = bundle.widget.uuid().map_or_else(new_uuid, str::to_owned);
                activate(
                    source,
                    bundle.source,
                    &context.view_prefix,
                    &uuid,
                    bundle.widget.state(),
                )?;
            }
            rendered += 1;
        }

        debug!(directive = directive.name(), rendered, "Directive rendered");
        Ok(rendered)
    }

    fn directive_notice(&self, err: &DirectiveError) -> Notice {
        match err {
            DirectiveError::Correlation(CorrelationError::Mismatch {
                nodes, elements, ..
            }) => Notice::from_error(
                &self.messages,
                ErrorKind::Mismatch,
                &[
                    ("node_count", &nodes.to_string()),
                    ("element_count", &elements.to_string()),
                ],
            ),
            _ => Notice::from_error(&self.messages, ErrorKind::Unknown, &[]),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn host_error_kind(err: &HostError) -> ErrorKind {
    match err {
        HostError::Permissions(_) => ErrorKind::Permissions,
        HostError::Metadata(_) => ErrorKind::Metadata,
        _ => ErrorKind::Unknown,
    }
}

fn run_error_kind(err: &RunError) -> ErrorKind {
    match err {
        RunError::Host(host) => host_error_kind(host),
        RunError::MissingMetadata { .. } => ErrorKind::Metadata,
        _ => ErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wv_config::{DngConfig, WidgetKind};

    use super::*;
    use crate::host::{DocumentHandle, LocalHost, Metadata, PageMeta};
    use crate::registry::PatternDirective;
    use crate::status::Severity;

    const TABLE_HREF: &str = "/display/ENG/CAE+CED+Table+Element";

    fn page() -> PageMeta {
        PageMeta {
            page_id: "42".to_owned(),
            title: "Design".to_owned(),
            space_key: "ENG".to_owned(),
            base_url: "https://wiki.example.com".to_owned(),
        }
    }

    fn document() -> DocumentHandle {
        DocumentHandle {
            page_id: "7".to_owned(),
            title: "System Spec".to_owned(),
        }
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.dng = Some(DngConfig {
            prefix: "https://dng.example.com/rm/".to_owned(),
        });
        config
    }

    fn storage() -> String {
        concat!(
            r#"<p><ac:link><ri:page ri:content-title="CAE CED Table Element" /></ac:link></p>"#,
            r#"<p>Traces to <a href="https://dng.example.com/rm/resources/1">REQ-1</a></p>"#
        )
        .to_owned()
    }

    fn view() -> LiveDocument {
        LiveDocument::parse(concat!(
            r#"<div id="main-header"><div id="navigation"></div></div>"#,
            r#"<div id="main-content">"#,
            r#"<p><a href="/display/ENG/CAE+CED+Table+Element">CAE CED Table Element</a></p>"#,
            r#"<p>Traces to <a href="https://dng.example.com/rm/resources/1">REQ-1</a></p>"#,
            r#"</div>"#
        ))
        .unwrap()
    }

    fn tracked_host() -> LocalHost {
        LocalHost::new(page())
            .with_source(storage())
            .with_page_metadata(json!({"elements": {}}))
            .with_document(document(), Some(json!({"connection": {}})))
    }

    #[tokio::test]
    async fn test_untracked_page_renders_nothing() {
        let config = config();
        let host = LocalHost::new(page()).with_source(storage());
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();

        assert_eq!(outcome.phase, Phase::Aborted);
        assert_eq!(outcome.rendered, 0);
        assert!(
            live.query_selector_all(live.document_node(), ".wv-widget")
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_renders_page_and_pattern_directives() {
        let config = config();
        let host = tracked_host();
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();

        assert_eq!(outcome.phase, Phase::Ready);
        assert_eq!(outcome.rendered, 2);
        assert!(outcome.failures.is_empty());

        let root = live.document_node();
        let table = live.query_selector(root, ".wv-query-table").unwrap().unwrap();
        let table_link = live
            .query_selector(root, &format!(r#"a[href="{TABLE_HREF}"]"#))
            .unwrap()
            .unwrap();
        assert!(live.is_hidden(table_link));
        let siblings = live.children(live.parent(table_link).unwrap()).to_vec();
        let position = siblings.iter().position(|&c| c == table_link).unwrap();
        assert_eq!(siblings[position - 1], table);

        let uuid = live.get_attribute(table, "data-uuid").unwrap().to_owned();
        let page_metadata = outcome.page_metadata.unwrap();
        assert_eq!(
            page_metadata["elements"]["serialized"]["queryTable"][&uuid]["uuid"],
            json!(uuid)
        );

        let artifact = live.query_selector(root, ".wv-dng-artifact").unwrap().unwrap();
        assert_eq!(live.text_content(artifact), "REQ-1");
    }

    #[tokio::test]
    async fn test_mismatch_is_contained_to_its_directive() {
        let config = config();
        let host = LocalHost::new(page())
            .with_source(format!(
                r#"{}<p><a href="https://dng.example.com/rm/resources/2">REQ-2</a></p>"#,
                storage()
            ))
            .with_document(document(), Some(json!({})));
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();

        assert_eq!(outcome.rendered, 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].directive, "dng-artifact");
        assert!(matches!(
            outcome.failures[0].error,
            DirectiveError::Correlation(CorrelationError::Mismatch {
                nodes: 2,
                elements: 1,
                ..
            })
        ));
        assert_eq!(outcome.notices.len(), 1);
        assert_eq!(outcome.notices[0].severity, Severity::Error);
        assert!(outcome.notices[0].message.contains("Found 2 directive(s)"));

        // The failed directive left its anchors alone.
        let dng_link = live
            .query_selector(live.document_node(), r#"a[href^="https://dng.example.com/"]"#)
            .unwrap()
            .unwrap();
        assert!(!live.is_hidden(dng_link));
        assert!(
            live.query_selector(live.document_node(), ".wv-notice-error")
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_missing_document_metadata_aborts() {
        let config = config();
        let host = LocalHost::new(page())
            .with_source(storage())
            .with_document(document(), None);
        let mut live = view();

        let err = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::MissingMetadata { ref document } if document == "System Spec"));
        assert!(
            live.query_selector(live.document_node(), ".wv-notice-fatal")
                .unwrap()
                .is_some()
        );
        assert!(
            live.query_selector(live.document_node(), ".wv-widget")
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_missing_and_malformed_source() {
        let config = config();
        let orchestrator = Orchestrator::new(&config).unwrap();

        let host = LocalHost::new(page()).with_document(document(), Some(json!({})));
        let err = orchestrator.run(&host, &mut view()).await.unwrap_err();
        assert!(matches!(err, RunError::MissingSource));

        let host = host.with_source("<p><b>x</p></b>");
        let err = orchestrator.run(&host, &mut view()).await.unwrap_err();
        assert!(matches!(err, RunError::Parse(_)));
    }

    #[tokio::test]
    async fn test_missing_content_root() {
        let config = config();
        let host = tracked_host();
        let mut live = LiveDocument::parse("<p>no content root</p>").unwrap();

        let err = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::MissingContentRoot(ref s) if s == "#main-content"));
    }

    #[tokio::test]
    async fn test_writeback_activates_rendered_nodes() {
        let mut config = config();
        config.directives.writeback = true;
        let host = tracked_host();
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();

        let source = outcome.source.unwrap();
        let spans = source
            .select(r#".//ac:structured-macro[@ac:name="span"]"#)
            .unwrap();
        assert_eq!(spans.len(), 2);

        let table = live
            .query_selector(live.document_node(), ".wv-query-table")
            .unwrap()
            .unwrap();
        let uuid = live.get_attribute(table, "data-uuid").unwrap();
        let markup = source.serialize();
        assert!(markup.contains(&format!(r#"<ac:parameter ac:name="id">ve4-{uuid}</ac:parameter>"#)));
        assert!(markup.contains("<ac:plain-text-body><![CDATA["));

        let state = outcome.page_metadata.unwrap()["elements"]["serialized"]["queryTable"][&uuid]
            .clone();
        assert!(state.is_object());

        // A second pass over the activated source keeps the table's uuid and skips the
        // activated DNG link, which no longer renders as a plain anchor. The page
        // metadata was never saved, so the state comes back from the span.
        let host = LocalHost::new(page())
            .with_source(markup.clone())
            .with_page_metadata(json!({}))
            .with_document(document(), Some(json!({})));
        let mut live = LiveDocument::parse(&format!(
            r#"<div id="main-content"><p><a href="{TABLE_HREF}">CAE CED Table Element</a></p></div>"#
        ))
        .unwrap();
        let second = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();
        assert_eq!(second.rendered, 1);
        assert!(second.failures.is_empty());
        let table = live
            .query_selector(live.document_node(), ".wv-query-table")
            .unwrap()
            .unwrap();
        assert_eq!(
            second.page_metadata.unwrap()["elements"]["serialized"]["queryTable"][&uuid],
            state
        );
        assert_eq!(live.get_attribute(table, "data-uuid"), Some(uuid));
        assert_eq!(second.source.unwrap().serialize(), markup);
    }

    struct DeniedMetadata(LocalHost);

    #[async_trait]
    impl ContentSource for DeniedMetadata {
        fn page(&self) -> &PageMeta {
            self.0.page()
        }

        async fn page_metadata(&self, _refresh: bool) -> Result<Option<Metadata>, HostError> {
            Err(HostError::Permissions("403".to_owned()))
        }

        async fn document(&self) -> Result<Option<DocumentHandle>, HostError> {
            self.0.document().await
        }

        async fn source_markup(&self) -> Result<Option<String>, HostError> {
            self.0.source_markup().await
        }

        async fn document_metadata(
            &self,
            document: &DocumentHandle,
        ) -> Result<Option<Metadata>, HostError> {
            self.0.document_metadata(document).await
        }
    }

    #[tokio::test]
    async fn test_page_metadata_failure_does_not_block_run() {
        let config = config();
        let host = DeniedMetadata(tracked_host());
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .run(&host, &mut live)
            .await
            .unwrap();

        assert_eq!(outcome.rendered, 2);
        assert_eq!(outcome.notices[0].severity, Severity::Warn);
    }

    #[tokio::test]
    async fn test_custom_registry() {
        let config = Config::default();
        let registry = Registry::default().with(Directive::Pattern(PatternDirective {
            name: "links".to_owned(),
            widget: WidgetKind::DngArtifact,
            storage: ".//a".to_owned(),
            live: "a".to_owned(),
        }));
        let host = tracked_host();
        let mut live = view();

        let outcome = Orchestrator::new(&config)
            .unwrap()
            .with_registry(registry)
            .run(&host, &mut live)
            .await
            .unwrap();

        // The ri:page reference is not an anchor in storage, so the counts disagree.
        assert_eq!(outcome.rendered, 0);
        assert_eq!(outcome.failures.len(), 1);
    }

    #[test]
    fn test_missing_message_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lang.toml");
        std::fs::write(&path, "[error]\nunknown = \"x\"\n").unwrap();
        let mut config = Config::default();
        config.lang_path = Some(path);

        let err = Orchestrator::new(&config).unwrap_err();
        assert!(matches!(
            err,
            RunError::Configuration(ConfigError::MissingMessage(_))
        ));
    }
}
