//! Error types for the storage document model.

use std::str::Utf8Error;

/// Error while parsing storage markup.
///
/// Byte positions are relative to the fragment passed to
/// [`Document::parse`](crate::Document::parse), not to the wrapped string.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Markup is not well-formed (mismatched tags, bad syntax).
    #[error("malformed markup near byte {position}")]
    Xml {
        /// Byte offset of the failure.
        position: u64,
        /// Underlying reader error.
        #[source]
        source: quick_xml::Error,
    },

    /// Malformed attribute list.
    #[error("malformed attribute near byte {position}")]
    Attribute {
        /// Byte offset of the element holding the attribute.
        position: u64,
        /// Underlying attribute error.
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },

    /// Attribute value contains an invalid escape.
    #[error("invalid escape in attribute value near byte {position}")]
    Escape {
        /// Byte offset of the element holding the attribute.
        position: u64,
        /// Underlying escape error.
        #[source]
        source: quick_xml::escape::EscapeError,
    },

    /// Entity reference that strict markup does not define.
    #[error("undefined entity &{name}; near byte {position}")]
    UndefinedEntity {
        /// Entity name without `&` and `;`.
        name: String,
        /// Byte offset of the reference.
        position: u64,
    },

    /// Unescaped `&` in text content.
    #[error("unescaped '&' near byte {position}")]
    BareAmpersand {
        /// Byte offset of the text run.
        position: u64,
    },

    /// Character that is not allowed in markup.
    #[error("invalid character U+{code:04X} near byte {position}")]
    InvalidCharacter {
        /// Code point of the offending character.
        code: u32,
        /// Byte offset of the text run.
        position: u64,
    },

    /// Construct that cannot appear inside a fragment (`<?xml ...?>`, `<!DOCTYPE>`).
    #[error("{0} is not allowed inside a fragment")]
    Misplaced(&'static str),

    /// Element left open at end of input.
    #[error("unclosed element <{0}>")]
    Unclosed(String),

    /// UTF-8 decoding error.
    #[error("UTF-8 error")]
    Utf8(#[from] Utf8Error),
}

/// Error while compiling or evaluating an XPath expression.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// Expression could not be tokenized or parsed.
    #[error("XPath syntax error at offset {offset}: {message}")]
    Syntax {
        /// Character offset in the expression.
        offset: usize,
        /// Description of the problem.
        message: String,
    },

    /// Name test uses a prefix with no bound namespace.
    #[error("unbound namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// Call to a function outside the supported core library.
    #[error("unknown function {0}()")]
    UnknownFunction(String),

    /// Function called with the wrong number of arguments.
    #[error("{name}() takes {expected} argument(s), got {found}")]
    Arity {
        /// Function name.
        name: &'static str,
        /// Human-readable expected count.
        expected: &'static str,
        /// Number of arguments supplied.
        found: usize,
    },

    /// Variable references have no binding context here.
    #[error("variable reference ${0} is not supported")]
    Variable(String),

    /// Operation requires a node-set but got another type.
    #[error("expected a node-set, got {0}")]
    NotNodeSet(&'static str),

    /// Node selection produced attribute nodes where tree nodes were expected.
    #[error("expression selects attributes; use evaluate() to read them")]
    AttributeSelection,

    /// Context node does not belong to the queried document.
    #[error("context node belongs to another document")]
    ForeignContext,
}

/// Error from structural tree mutation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TreeError {
    /// Node id was issued by a different document.
    #[error("node belongs to another document")]
    ForeignNode,

    /// Node cannot hold children (text, comment, document node).
    #[error("node cannot hold children")]
    InvalidParent,

    /// Node cannot be inserted (document node or the synthetic root).
    #[error("node cannot be inserted into the tree")]
    InvalidChild,

    /// Insertion would make a node its own ancestor.
    #[error("insertion would create a cycle")]
    Cycle,

    /// Reference node is not a child of the given parent.
    #[error("node is not a child of the given parent")]
    NotAChild,
}
