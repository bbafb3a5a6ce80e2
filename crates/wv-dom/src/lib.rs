//! Live document model for rendered Confluence pages.
//!
//! The rendered view of a page is tag soup rather than well-formed markup, so
//! [`LiveDocument::parse`] recovers from unclosed and stray tags the way a
//! browser would. Elements are found with CSS selectors
//! ([`LiveDocument::query_selector_all`]) and mutated with the handful of
//! operations widget mounting needs: [`LiveDocument::hide`],
//! [`LiveDocument::insert_before`] and attribute updates.
//!
//! # Example
//!
//! ```
//! use wv_dom::LiveDocument;
//!
//! let mut dom = LiveDocument::parse(r#"<div id="main-content"><a href="/display/ENG/Home">Home</a></div>"#)?;
//! let link = dom.query_selector(dom.document_node(), r#"a[href^="/display/"]"#)?.unwrap();
//! dom.hide(link)?;
//! assert_eq!(dom.get_attribute(link, "style"), Some("display: none;"));
//! # Ok::<(), wv_dom::DomError>(())
//! ```

mod error;
mod html;
mod selector;
mod tree;

pub use error::DomError;
pub use selector::Selector;
pub use tree::{LiveDocument, NodeId};
