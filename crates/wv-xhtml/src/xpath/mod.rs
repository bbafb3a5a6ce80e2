//! XPath 1.0 queries over a [`Document`].
//!
//! Supports the full expression grammar except variables and the `namespace`
//! axis, plus the core function library minus `id()` and `lang()`. Name-test
//! prefixes are resolved when the expression is compiled, against the
//! document's bindings.

mod eval;
mod functions;
mod lexer;
mod parser;

use std::fmt;

use eval::{Evaluator, Item, Val};
use parser::Expr;

use crate::error::QueryError;
use crate::namespaces::Namespaces;
use crate::tree::{Document, NodeId};

/// Result item of [`XPath::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    /// Tree node.
    Node(NodeId),
    /// Attribute of an element.
    Attribute {
        /// Owning element.
        element: NodeId,
        /// Qualified attribute name.
        name: String,
        /// Attribute value.
        value: String,
    },
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Node-set in document order.
    Nodes(Vec<Selected>),
    String(String),
    Number(f64),
    Boolean(bool),
}

/// Compiled expression.
#[derive(Debug, Clone)]
pub struct XPath {
    source: String,
    expr: Expr,
}

impl XPath {
    /// Compile an expression.
    ///
    /// `&nbsp;` in the expression stands for U+00A0, matching what the parser
    /// produces for the entity in documents.
    pub fn compile(expression: &str, namespaces: &Namespaces) -> Result<Self, QueryError> {
        let source = expression.replace("&nbsp;", "\u{a0}");
        let expr = parser::parse(&source, namespaces)?;
        Ok(Self { source, expr })
    }

    /// Expression text after entity substitution.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate with `context` as the context node.
    pub fn evaluate(&self, doc: &Document, context: NodeId) -> Result<Value, QueryError> {
        let index = doc.index(context).ok_or(QueryError::ForeignContext)?;
        let evaluator = Evaluator::new(doc);
        Ok(match evaluator.run(&self.expr, Item::Node(index))? {
            Val::Nodes(items) => Value::Nodes(
                items
                    .into_iter()
                    .map(|item| match item {
                        Item::Node(index) => Selected::Node(doc.handle(index)),
                        Item::Attribute(element, position) => {
                            let attribute = &doc.attributes(doc.handle(element))[position];
                            Selected::Attribute {
                                element: doc.handle(element),
                                name: attribute.name.clone(),
                                value: attribute.value.clone(),
                            }
                        }
                    })
                    .collect(),
            ),
            Val::Str(text) => Value::String(text),
            Val::Num(number) => Value::Number(number),
            Val::Bool(flag) => Value::Boolean(flag),
        })
    }

    /// Evaluate and return the selected tree nodes in document order.
    pub fn select(&self, doc: &Document, context: NodeId) -> Result<Vec<NodeId>, QueryError> {
        let index = doc.index(context).ok_or(QueryError::ForeignContext)?;
        match Evaluator::new(doc).run(&self.expr, Item::Node(index))? {
            Val::Nodes(items) => items
                .into_iter()
                .map(|item| match item {
                    Item::Node(index) => Ok(doc.handle(index)),
                    Item::Attribute(..) => Err(QueryError::AttributeSelection),
                })
                .collect(),
            Val::Str(_) => Err(QueryError::NotNodeSet("string")),
            Val::Num(_) => Err(QueryError::NotNodeSet("number")),
            Val::Bool(_) => Err(QueryError::NotNodeSet("boolean")),
        }
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Quote `value` as an XPath string literal.
///
/// Values containing both quote kinds become a `concat()` call.
#[must_use]
pub fn literal(value: &str) -> String {
    if !value.contains('"') {
        format!("\"{value}\"")
    } else if !value.contains('\'') {
        format!("'{value}'")
    } else {
        let parts: Vec<String> = value.split('"').map(|part| format!("\"{part}\"")).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

impl Document {
    /// Select nodes with the document node as context.
    pub fn select(&self, expression: &str) -> Result<Vec<NodeId>, QueryError> {
        self.select_from(self.document_node(), expression)
    }

    /// First node in document order, if any.
    pub fn select_one(&self, expression: &str) -> Result<Option<NodeId>, QueryError> {
        Ok(self.select(expression)?.into_iter().next())
    }

    /// Select nodes relative to `context`, which may be a detached node.
    pub fn select_from(&self, context: NodeId, expression: &str) -> Result<Vec<NodeId>, QueryError> {
        XPath::compile(expression, &self.namespaces)?.select(self, context)
    }

    /// Evaluate an expression of any result type with the document node as context.
    pub fn evaluate(&self, expression: &str) -> Result<Value, QueryError> {
        XPath::compile(expression, &self.namespaces)?.evaluate(self, self.document_node())
    }
}
