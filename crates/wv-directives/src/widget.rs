//! Widgets mounted in place of directives.

use serde_json::{Value, json};
use wv_dom::{DomError, LiveDocument, NodeId};

use crate::context::PageContext;
use crate::store::StoreError;

/// Object store prefix of serialized query tables.
pub const QUERY_TABLE_STORE_PREFIX: &str = "page#elements.serialized.queryTable";

/// SPARQL-backed query table with persistent state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    pub uuid: String,
    pub label: String,
    /// Object store key the state lives under.
    pub store_key: String,
    pub state: Value,
}

impl QueryTable {
    /// State of a table that has never been saved.
    pub fn default_state(uuid: &str) -> Value {
        json!({
            "type": "MmsSparqlQueryTable",
            "uuid": uuid,
            "group": "dng",
            "queryTypePath": "hardcoded#queryType.sparql.dng.afsr",
            "connectionPath": "document#connection.sparql.mms.dng",
            "parameterValues": {},
        })
    }

    /// Load the table's state from the page store, seeding it on first use.
    ///
    /// The seed is `embedded` (state written into the page source by an
    /// earlier activation) when present, otherwise the default state.
    pub fn load(
        context: &PageContext,
        uuid: String,
        label: String,
        embedded: Option<Value>,
    ) -> Result<Self, StoreError> {
        let store_key = format!("{QUERY_TABLE_STORE_PREFIX}.{uuid}");
        let seed = embedded.unwrap_or_else(|| Self::default_state(&uuid));
        let state = context.store.get_or_insert(&store_key, seed)?;
        Ok(Self {
            uuid,
            label,
            store_key,
            state,
        })
    }
}

/// Inline view of a DOORS Next artifact link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DngArtifact {
    pub href: String,
    pub label: String,
}

/// Widget identity together with its resolved props.
#[derive(Debug, Clone, PartialEq)]
pub enum Widget {
    QueryTable(QueryTable),
    DngArtifact(DngArtifact),
}

impl Widget {
    /// Stable identifier, for widgets whose state persists.
    pub fn uuid(&self) -> Option<&str> {
        match self {
            Self::QueryTable(table) => Some(&table.uuid),
            Self::DngArtifact(_) => None,
        }
    }

    /// Persistent state written into activated source markup.
    pub fn state(&self) -> Option<&Value> {
        match self {
            Self::QueryTable(table) => Some(&table.state),
            Self::DngArtifact(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryTable(_) => "query-table",
            Self::DngArtifact(_) => "dng-artifact",
        }
    }

    /// Initialization payload.
    pub fn props(&self) -> Value {
        match self {
            Self::QueryTable(table) => json!({
                "uuid": table.uuid,
                "label": table.label,
                "storeKey": table.store_key,
                "state": table.state,
            }),
            Self::DngArtifact(artifact) => json!({
                "href": artifact.href,
                "label": artifact.label,
            }),
        }
    }

    /// Create the widget's detached element tree in `dom`.
    pub(crate) fn build(&self, dom: &mut LiveDocument, props: &Value) -> Result<NodeId, DomError> {
        let (tag, body) = match self {
            Self::QueryTable(table) => {
                let body = dom.create_element("table");
                let caption = dom.create_element("caption");
                let label = dom.create_text(&table.label);
                dom.append_child(caption, label)?;
                dom.append_child(body, caption)?;
                let tbody = dom.create_element("tbody");
                dom.append_child(body, tbody)?;
                ("div", body)
            }
            Self::DngArtifact(artifact) => {
                let link = dom.create_element("a");
                dom.set_attribute(link, "href", &artifact.href)?;
                let label = dom.create_text(&artifact.label);
                dom.append_child(link, label)?;
                ("span", link)
            }
        };

        let root = dom.create_element(tag);
        dom.set_attribute(root, "class", &format!("wv-widget wv-{}", self.name()))?;
        dom.set_attribute(root, "data-widget", self.name())?;
        if let Some(uuid) = self.uuid() {
            dom.set_attribute(root, "data-uuid", uuid)?;
        }
        dom.set_attribute(root, "data-props", &props.to_string())?;
        dom.append_child(root, body)?;
        Ok(root)
    }
}
