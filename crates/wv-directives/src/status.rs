//! Status bar surfaced in the page header.

use std::fmt;

use tracing::debug;
use wv_config::{LiveConfig, Messages};
use wv_dom::{DomError, LiveDocument, NodeId};

/// Severity of a status notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error categories shown to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The reader may not see the page metadata.
    Permissions,
    /// Page or document metadata is missing or unreadable.
    Metadata,
    /// Source and rendered page disagree for a directive.
    Mismatch,
    Unknown,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::Permissions => Severity::Warn,
            Self::Mismatch => Severity::Error,
            Self::Metadata | Self::Unknown => Severity::Fatal,
        }
    }

    /// Localization key of the message template.
    pub fn message_key(self) -> &'static str {
        match self {
            Self::Permissions => "error.page_permissions",
            Self::Metadata => "error.page_metadata",
            Self::Mismatch => "error.xpath_dom_mismatch",
            Self::Unknown => "error.unknown",
        }
    }
}

/// One message in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    /// Notice for `kind` with its localized, formatted message.
    pub fn from_error(messages: &Messages, kind: ErrorKind, params: &[(&str, &str)]) -> Self {
        Self::new(kind.severity(), messages.render(kind.message_key(), params))
    }
}

/// Status bar element plus the notices pushed into it.
#[derive(Debug, Default)]
pub struct StatusBar {
    element: Option<NodeId>,
    notices: Vec<Notice>,
}

impl StatusBar {
    /// Mount an empty bar into the page.
    ///
    /// The bar goes before the navigation element inside the header, or at
    /// the top of the content root when the page has no such header. A page
    /// with neither gets no bar; notices are still collected.
    pub fn mount(dom: &mut LiveDocument, live: &LiveConfig) -> Result<Self, DomError> {
        let root = dom.document_node();
        let position = match dom.query_selector(root, &live.header_selector)? {
            Some(header) => {
                let navigation = dom
                    .query_selector(header, &live.navigation_selector)?
                    .filter(|&nav| dom.parent(nav) == Some(header));
                Some((header, navigation))
            }
            None => dom
                .query_selector(root, &live.content_selector)?
                .map(|content| (content, dom.children(content).first().copied())),
        };

        let Some((parent, before)) = position else {
            debug!("No header or content root; status bar not mounted");
            return Ok(Self::default());
        };
        let element = dom.create_element("div");
        dom.set_attribute(element, "class", "wv-status-bar")?;
        dom.insert_before(parent, element, before)?;
        Ok(Self {
            element: Some(element),
            notices: Vec::new(),
        })
    }

    /// Record a notice and show it in the bar.
    pub fn push(&mut self, dom: &mut LiveDocument, notice: Notice) -> Result<(), DomError> {
        if let Some(bar) = self.element {
            let item = dom.create_element("div");
            dom.set_attribute(
                item,
                "class",
                &format!("wv-notice wv-notice-{}", notice.severity),
            )?;
            let text = dom.create_text(&notice.message);
            dom.append_child(item, text)?;
            dom.append_child(bar, item)?;
        }
        self.notices.push(notice);
        Ok(())
    }

    /// Bar element, if one was mounted.
    pub fn element(&self) -> Option<NodeId> {
        self.element
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn into_notices(self) -> Vec<Notice> {
        self.notices
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_severity_per_error_kind() {
        assert_eq!(ErrorKind::Permissions.severity(), Severity::Warn);
        assert_eq!(ErrorKind::Metadata.severity(), Severity::Fatal);
        assert_eq!(ErrorKind::Unknown.severity(), Severity::Fatal);
        assert_eq!(ErrorKind::Mismatch.severity(), Severity::Error);
    }

    #[test]
    fn test_mount_before_navigation() {
        let mut dom = LiveDocument::parse(
            r#"<div id="main-header"><h1>T</h1><div id="navigation">nav</div></div><div id="main-content"></div>"#,
        )
        .unwrap();
        let mut bar = StatusBar::mount(&mut dom, &LiveConfig::default()).unwrap();
        bar.push(&mut dom, Notice::new(Severity::Warn, "careful")).unwrap();

        assert_eq!(
            dom.to_html(),
            concat!(
                r#"<div id="main-header"><h1>T</h1><div class="wv-status-bar"><div class="wv-notice wv-notice-warn">careful</div></div>"#,
                r#"<div id="navigation">nav</div></div><div id="main-content"></div>"#
            )
        );
    }

    #[test]
    fn test_mount_falls_back_to_content_root() {
        let mut dom = LiveDocument::parse(r#"<div id="main-content"><p>x</p></div>"#).unwrap();
        let bar = StatusBar::mount(&mut dom, &LiveConfig::default()).unwrap();
        assert!(bar.element().is_some());
        assert_eq!(
            dom.to_html(),
            r#"<div id="main-content"><div class="wv-status-bar"></div><p>x</p></div>"#
        );
    }

    #[test]
    fn test_unmounted_bar_still_collects_notices() {
        let mut dom = LiveDocument::parse("<p>bare</p>").unwrap();
        let mut bar = StatusBar::mount(&mut dom, &LiveConfig::default()).unwrap();
        bar.push(&mut dom, Notice::new(Severity::Info, "hello")).unwrap();
        assert_eq!(bar.element(), None);
        assert_eq!(bar.notices().len(), 1);
        assert_eq!(dom.to_html(), "<p>bare</p>");
    }

    #[test]
    fn test_notice_from_error_formats_message() {
        let messages = Messages::english().unwrap();
        let notice = Notice::from_error(
            &messages,
            ErrorKind::Mismatch,
            &[("node_count", "2"), ("element_count", "1")],
        );
        assert_eq!(notice.severity, Severity::Error);
        assert!(notice.message.starts_with("Found 2 directive(s) in the page source but 1"));
    }
}
