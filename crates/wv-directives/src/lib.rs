//! Directive processing for wv.
//!
//! A directive is a recognizable construct in a page's storage markup (a
//! link to a well-known page, an artifact URL) that is replaced by a widget
//! on the rendered page. This crate holds the registry of directives, the
//! widgets they produce, the status bar, the per-page object store and the
//! [`Orchestrator`] that runs everything for one page.
//!
//! ```ignore
//! let orchestrator = Orchestrator::new(&config)?;
//! let outcome = orchestrator.run(&host, &mut live).await?;
//! println!("{} widget(s)", outcome.rendered);
//! ```

mod context;
mod error;
mod host;
mod orchestrator;
pub mod queries;
mod registry;
mod render;
mod status;
mod store;
mod widget;
mod writeback;

pub use context::{PageContext, new_uuid};
pub use error::{DirectiveError, RunError};
pub use host::{ContentSource, DocumentHandle, HostError, LocalHost, Metadata, PageMeta};
pub use orchestrator::{DirectiveFailure, Orchestrator, Phase, RunOutcome};
pub use registry::{
    DNG_DIRECTIVE, Directive, DirectiveDescriptor, Extracted, PageDirective, PatternDirective,
    Registry, WidgetResult,
};
pub use render::render;
pub use status::{ErrorKind, Notice, Severity, StatusBar};
pub use store::{ObjectStore, Scope, StoreError, StoreKey};
pub use widget::{DngArtifact, QUERY_TABLE_STORE_PREFIX, QueryTable, Widget};
pub use writeback::{activate, activation_target, active_state, active_uuid};
