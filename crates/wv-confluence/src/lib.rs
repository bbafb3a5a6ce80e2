//! Confluence integration for wv.
//!
//! [`ConfluenceClient`] wraps the Server/Data Center REST API;
//! [`ConfluenceHost`] exposes a page through the [`wv_directives::ContentSource`]
//! interface so the orchestrator can run against it.

mod client;
mod error;
mod host;
mod types;

pub use client::ConfluenceClient;
pub use error::ConfluenceError;
pub use host::ConfluenceHost;
pub use types::{Ancestor, Body, ContentProperty, Links, Page, Representation, Space};
