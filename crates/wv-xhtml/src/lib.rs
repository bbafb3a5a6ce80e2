//! Confluence storage-format document model.
//!
//! Storage markup is an XHTML fragment that uses the `ac:` and `ri:` element
//! prefixes without declaring them, may have several top-level siblings and
//! frequently contains HTML named entities. This crate makes it queryable:
//!
//! - [`Document::parse`]: wraps the fragment in a synthetic root that declares
//!   every supported prefix, resolves named entities and builds an arena tree
//! - [`Document::select`] / [`Document::select_one`]: XPath 1.0 queries with the
//!   prefixes pre-bound
//! - [`Document::append_child`], [`Document::replace_child`], [`Document::build`]:
//!   tree construction for writing generated markup back
//! - [`Document::serialize`]: renders the wrapper's children back to markup
//!
//! Unmodified nodes keep their original text, so serializing a freshly parsed
//! fragment reproduces it byte for byte.
//!
//! # Example
//!
//! ```
//! use wv_xhtml::Document;
//!
//! let doc = Document::parse(r#"<p><ac:link><ri:page ri:content-title="Home" /></ac:link></p>"#)?;
//! let pages = doc.select(r#".//ri:page[@ri:content-title="Home"]"#)?;
//! assert_eq!(pages.len(), 1);
//! assert_eq!(doc.name(doc.parent(pages[0]).unwrap()), Some("ac:link"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
pub mod entities;
mod error;
mod namespaces;
mod parser;
mod serializer;
mod tree;
pub mod xpath;

pub use builder::Child;
pub use error::{ParseError, QueryError, TreeError};
pub use namespaces::{Namespaces, URN_PREFIX, WRAPPER_TAG};
pub use tree::{Attribute, Document, NodeId, NodeType};
pub use xpath::{Selected, Value, XPath};
