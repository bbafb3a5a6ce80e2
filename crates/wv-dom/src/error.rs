//! Error types for the live document.

/// Error from parsing, querying or mutating a [`LiveDocument`](crate::LiveDocument).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomError {
    /// Markup is too broken to recover from (unterminated tag or comment).
    #[error("HTML parse error: {0}")]
    HtmlParse(String),

    /// Selector syntax outside the supported subset.
    #[error("unsupported selector: {0}")]
    UnsupportedSelector(String),

    /// Node id does not exist in this document.
    #[error("unknown node")]
    UnknownNode,

    /// Node cannot hold children.
    #[error("node cannot hold children")]
    InvalidParent,

    /// Node cannot be inserted (the document node).
    #[error("node cannot be inserted")]
    InvalidChild,

    /// Reference node is not a child of the given parent.
    #[error("reference node is not a child of the parent")]
    NotAChild,

    /// Insertion would make a node its own ancestor.
    #[error("insertion would create a cycle")]
    Cycle,
}
