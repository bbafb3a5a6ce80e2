//! Confluence content types.

use serde::Deserialize;
use serde_json::Value;

/// Confluence page with the expansions requested by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    /// Page ID.
    pub id: String,
    /// Page title.
    pub title: String,
    #[serde(default)]
    pub space: Option<Space>,
    #[serde(default)]
    pub body: Option<Body>,
    /// Ancestors, root first.
    #[serde(default)]
    pub ancestors: Vec<Ancestor>,
    /// Hypermedia links.
    #[serde(rename = "_links", default)]
    pub links: Option<Links>,
}

impl Page {
    pub fn storage(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.storage.as_ref())
            .map(|storage| storage.value.as_str())
    }

    pub fn view(&self) -> Option<&str> {
        self.body
            .as_ref()
            .and_then(|body| body.view.as_ref())
            .map(|view| view.value.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    pub key: String,
}

/// Page body content.
#[derive(Debug, Clone, Deserialize)]
pub struct Body {
    /// Storage format content.
    #[serde(default)]
    pub storage: Option<Representation>,
    /// Rendered HTML.
    #[serde(default)]
    pub view: Option<Representation>,
}

/// One body representation.
#[derive(Debug, Clone, Deserialize)]
pub struct Representation {
    pub value: String,
    pub representation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ancestor {
    pub id: String,
    pub title: String,
}

/// Hypermedia links.
#[derive(Debug, Clone, Deserialize)]
pub struct Links {
    /// Web UI link.
    #[serde(default)]
    pub webui: Option<String>,
    /// Site base URL.
    #[serde(default)]
    pub base: Option<String>,
}

/// Content property attached to a page.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentProperty {
    pub key: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_page_deserializes_expansions() {
        let page: Page = serde_json::from_str(
            r#"{
                "id": "42",
                "type": "page",
                "title": "Design",
                "space": {"key": "ENG", "name": "Engineering"},
                "body": {
                    "storage": {"value": "<p>x</p>", "representation": "storage"},
                    "view": {"value": "<p>x</p>", "representation": "view"}
                },
                "ancestors": [{"id": "1", "title": "Root"}, {"id": "7", "title": "Spec"}],
                "_links": {"webui": "/display/ENG/Design", "base": "https://wiki"}
            }"#,
        )
        .unwrap();

        assert_eq!(page.storage(), Some("<p>x</p>"));
        assert_eq!(page.view(), Some("<p>x</p>"));
        assert_eq!(page.space.unwrap().key, "ENG");
        assert_eq!(page.ancestors[1].title, "Spec");
        assert_eq!(page.links.unwrap().base.as_deref(), Some("https://wiki"));
    }

    #[test]
    fn test_page_without_body() {
        let page: Page = serde_json::from_str(r#"{"id": "1", "title": "T"}"#).unwrap();
        assert_eq!(page.storage(), None);
        assert!(page.ancestors.is_empty());
    }
}
