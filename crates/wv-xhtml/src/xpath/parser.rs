//! Recursive-descent parser producing the expression tree.

use std::iter::Peekable;
use std::vec::IntoIter;

use super::functions::Function;
use super::lexer::{Spanned, Token, tokenize};
use crate::error::QueryError;
use crate::namespaces::Namespaces;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Ancestor,
    AncestorOrSelf,
    Attribute,
    Child,
    Descendant,
    DescendantOrSelf,
    Following,
    FollowingSibling,
    Parent,
    Preceding,
    PrecedingSibling,
    SelfAxis,
}

impl Axis {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "ancestor" => Self::Ancestor,
            "ancestor-or-self" => Self::AncestorOrSelf,
            "attribute" => Self::Attribute,
            "child" => Self::Child,
            "descendant" => Self::Descendant,
            "descendant-or-self" => Self::DescendantOrSelf,
            "following" => Self::Following,
            "following-sibling" => Self::FollowingSibling,
            "parent" => Self::Parent,
            "preceding" => Self::Preceding,
            "preceding-sibling" => Self::PrecedingSibling,
            "self" => Self::SelfAxis,
            _ => return None,
        })
    }

    /// Reverse axes number their predicate positions nearest-first.
    pub(crate) fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    /// `*`: any node of the axis' principal type.
    Any,
    /// `prefix:*`, prefix already resolved.
    Namespace(String),
    Name {
        namespace: Option<String>,
        local: String,
    },
    Text,
    Node,
    Comment,
    ProcessingInstruction(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub(crate) axis: Axis,
    pub(crate) test: NodeTest,
    pub(crate) predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PathStart {
    /// `/...`: root of the context node's tree.
    Root,
    /// Relative to the context node.
    Context,
    /// Filter expression result.
    Filter(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Literal(String),
    Number(f64),
    Call(Function, Vec<Expr>),
    /// Primary expression with predicates, applied in document order.
    Filter(Box<Expr>, Vec<Expr>),
    Path(PathStart, Vec<Step>),
}

struct Parser<'a> {
    tokens: Peekable<IntoIter<Spanned>>,
    namespaces: &'a Namespaces,
    end: usize,
}

impl Parser<'_> {
    fn peek(&mut self) -> Option<&Token> {
        self.tokens.peek().map(|(token, _)| token)
    }

    fn offset(&mut self) -> usize {
        let end = self.end;
        self.tokens.peek().map_or(end, |(_, offset)| *offset)
    }

    fn next(&mut self) -> Option<Token> {
        self.tokens.next().map(|(token, _)| token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.tokens.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), QueryError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&mut self, message: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn expr(&mut self) -> Result<Expr, QueryError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.equality_expr()?;
        while self.eat(&Token::And) {
            let right = self.equality_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => CompareOp::Eq,
                Some(Token::Neq) => CompareOp::Neq,
                _ => return Ok(left),
            };
            self.next();
            let right = self.relational_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => CompareOp::Lt,
                Some(Token::Le) => CompareOp::Le,
                Some(Token::Gt) => CompareOp::Gt,
                Some(Token::Ge) => CompareOp::Ge,
                _ => return Ok(left),
            };
            self.next();
            let right = self.additive_expr()?;
            left = Expr::Compare(op, Box::new(left), Box::new(right));
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.multiplicative_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => return Ok(left),
            };
            self.next();
            let right = self.multiplicative_expr()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn multiplicative_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => ArithOp::Mul,
                Some(Token::Div) => ArithOp::Div,
                Some(Token::Mod) => ArithOp::Mod,
                _ => return Ok(left),
            };
            self.next();
            let right = self.unary_expr()?;
            left = Expr::Arith(op, Box::new(left), Box::new(right));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::Minus) {
            let operand = self.unary_expr()?;
            return Ok(Expr::Negate(Box::new(operand)));
        }
        self.union_expr()
    }

    fn union_expr(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn path_expr(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(
                Token::Literal(_)
                | Token::Number(_)
                | Token::FunctionName(_)
                | Token::LParen
                | Token::Variable(_),
            ) => {
                let primary = self.primary_expr()?;
                let predicates = self.predicates()?;
                let filter = if predicates.is_empty() {
                    primary
                } else {
                    Expr::Filter(Box::new(primary), predicates)
                };

                let mut steps = Vec::new();
                if self.continue_path(&mut steps)? {
                    self.relative_path(&mut steps)?;
                    Ok(Expr::Path(PathStart::Filter(Box::new(filter)), steps))
                } else {
                    Ok(filter)
                }
            }
            Some(Token::Slash) => {
                self.next();
                let mut steps = Vec::new();
                if self.starts_step() {
                    self.relative_path(&mut steps)?;
                }
                Ok(Expr::Path(PathStart::Root, steps))
            }
            Some(Token::DoubleSlash) => {
                self.next();
                let mut steps = vec![Step::descendant_or_self()];
                self.relative_path(&mut steps)?;
                Ok(Expr::Path(PathStart::Root, steps))
            }
            _ => {
                let mut steps = Vec::new();
                self.relative_path(&mut steps)?;
                Ok(Expr::Path(PathStart::Context, steps))
            }
        }
    }

    /// Consume a `/` or `//` separator; `//` adds its implicit step.
    fn continue_path(&mut self, steps: &mut Vec<Step>) -> Result<bool, QueryError> {
        match self.peek() {
            Some(Token::Slash) => {
                self.next();
                Ok(true)
            }
            Some(Token::DoubleSlash) => {
                self.next();
                steps.push(Step::descendant_or_self());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn starts_step(&mut self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Name(_)
                    | Token::Star
                    | Token::PrefixWildcard(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
                    | Token::At
                    | Token::Dot
                    | Token::DotDot
            )
        )
    }

    fn relative_path(&mut self, steps: &mut Vec<Step>) -> Result<(), QueryError> {
        steps.push(self.step()?);
        while self.continue_path(steps)? {
            steps.push(self.step()?);
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Step, QueryError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::SelfAxis,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = match self.peek().cloned() {
            Some(Token::At) => {
                self.next();
                Axis::Attribute
            }
            Some(Token::AxisName(name)) => {
                let axis = if name == "namespace" {
                    return Err(self.error("the namespace axis is not supported"));
                } else {
                    Axis::from_name(&name)
                        .ok_or_else(|| self.error(format!("unknown axis '{name}'")))?
                };
                self.next();
                self.expect(&Token::ColonColon, "'::'")?;
                axis
            }
            _ => Axis::Child,
        };

        let test = self.node_test()?;
        let predicates = self.predicates()?;
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn node_test(&mut self) -> Result<NodeTest, QueryError> {
        match self.next() {
            Some(Token::Star) => Ok(NodeTest::Any),
            Some(Token::PrefixWildcard(prefix)) => Ok(NodeTest::Namespace(self.resolve(&prefix)?)),
            Some(Token::Name(name)) => match name.split_once(':') {
                Some((prefix, local)) => Ok(NodeTest::Name {
                    namespace: Some(self.resolve(prefix)?),
                    local: local.to_owned(),
                }),
                None => Ok(NodeTest::Name {
                    namespace: None,
                    local: name,
                }),
            },
            Some(Token::NodeType(kind)) => {
                self.expect(&Token::LParen, "'('")?;
                let test = match kind.as_str() {
                    "text" => NodeTest::Text,
                    "node" => NodeTest::Node,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.next();
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RParen, "')'")?;
                Ok(test)
            }
            _ => Err(self.error("expected a node test")),
        }
    }

    fn resolve(&self, prefix: &str) -> Result<String, QueryError> {
        self.namespaces
            .resolve(prefix)
            .map(str::to_owned)
            .ok_or_else(|| QueryError::UnknownPrefix(prefix.to_owned()))
    }

    fn predicates(&mut self) -> Result<Vec<Expr>, QueryError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(&Token::RBracket, "']'")?;
        }
        Ok(predicates)
    }

    fn primary_expr(&mut self) -> Result<Expr, QueryError> {
        match self.next() {
            Some(Token::Literal(value)) => Ok(Expr::Literal(value)),
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Variable(name)) => Err(QueryError::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::FunctionName(name)) => {
                let function =
                    Function::lookup(&name).ok_or(QueryError::UnknownFunction(name))?;
                self.expect(&Token::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(&Token::Comma, "',' or ')'")?;
                    }
                }
                function.check_arity(args.len())?;
                Ok(Expr::Call(function, args))
            }
            _ => Err(self.error("expected an expression")),
        }
    }
}

/// Parse an expression, resolving name-test prefixes through `namespaces`.
pub(crate) fn parse(expression: &str, namespaces: &Namespaces) -> Result<Expr, QueryError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(QueryError::Syntax {
            offset: 0,
            message: "empty expression".to_owned(),
        });
    }
    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
        namespaces,
        end: expression.chars().count(),
    };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing tokens"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_default(expression: &str) -> Result<Expr, QueryError> {
        parse(expression, &Namespaces::confluence())
    }

    #[test]
    fn test_abbreviated_descendant_path() {
        let expr = parse_default(".//ri:page").unwrap();
        let Expr::Path(PathStart::Context, steps) = expr else {
            panic!("expected a relative path");
        };
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].axis, Axis::SelfAxis);
        assert_eq!(steps[1].axis, Axis::DescendantOrSelf);
        assert_eq!(
            steps[2].test,
            NodeTest::Name {
                namespace: Some("urn:confluence-prefix:ri".to_owned()),
                local: "page".to_owned(),
            }
        );
    }

    #[test]
    fn test_root_only_path() {
        assert_eq!(
            parse_default("/").unwrap(),
            Expr::Path(PathStart::Root, Vec::new())
        );
    }

    #[test]
    fn test_operator_precedence() {
        let expr = parse_default("1 + 2 * 3 = 7 or false()").unwrap();
        let Expr::Or(left, _) = expr else {
            panic!("expected or at the top");
        };
        assert!(matches!(*left, Expr::Compare(CompareOp::Eq, _, _)));
    }

    #[test]
    fn test_filter_path() {
        let expr = parse_default("(//p)[1]/b").unwrap();
        assert!(matches!(expr, Expr::Path(PathStart::Filter(_), ref steps) if steps.len() == 1));
    }

    #[test]
    fn test_unknown_prefix() {
        assert!(matches!(
            parse_default("//foo:bar"),
            Err(QueryError::UnknownPrefix(ref p)) if p == "foo"
        ));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert!(matches!(
            parse_default("frobnicate()"),
            Err(QueryError::UnknownFunction(_))
        ));
        assert!(matches!(
            parse_default("contains('a')"),
            Err(QueryError::Arity { name: "contains", .. })
        ));
    }

    #[test]
    fn test_variables_rejected() {
        assert!(matches!(parse_default("$x"), Err(QueryError::Variable(_))));
    }

    #[test]
    fn test_namespace_axis_rejected() {
        assert!(matches!(
            parse_default("namespace::*"),
            Err(QueryError::Syntax { .. })
        ));
    }

    #[test]
    fn test_trailing_tokens() {
        assert!(matches!(parse_default("a b"), Err(QueryError::Syntax { .. })));
    }
}
