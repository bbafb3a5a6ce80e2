//! XPath 1.0 tokenizer.
//!
//! Applies the lexical disambiguation rules of XPath 1.0 §3.7: whether `*`
//! and the names `and`, `or`, `div`, `mod` are operators depends on the
//! preceding token, and a name followed by `(` or `::` is a function, node
//! type or axis name.

use crate::error::QueryError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Multiply,
    And,
    Or,
    Div,
    Mod,
    /// `*` name test.
    Star,
    /// `prefix:*` name test.
    PrefixWildcard(String),
    /// Name test (`p`, `ac:link`).
    Name(String),
    FunctionName(String),
    AxisName(String),
    /// `text`, `node`, `comment`, `processing-instruction`.
    NodeType(String),
    Variable(String),
    Literal(String),
    Number(f64),
}

impl Token {
    /// Whether a following `*` or operator name must be read as an operator.
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Self::At
                | Self::ColonColon
                | Self::LParen
                | Self::LBracket
                | Self::Comma
                | Self::And
                | Self::Or
                | Self::Div
                | Self::Mod
                | Self::Multiply
                | Self::Slash
                | Self::DoubleSlash
                | Self::Pipe
                | Self::Plus
                | Self::Minus
                | Self::Eq
                | Self::Neq
                | Self::Lt
                | Self::Le
                | Self::Gt
                | Self::Ge
        )
    }
}

/// Token with its character offset in the expression.
pub(crate) type Spanned = (Token, usize);

const NODE_TYPES: &[&str] = &["comment", "text", "processing-instruction", "node"];

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '.' | '\u{b7}')
}

fn syntax(offset: usize, message: impl Into<String>) -> QueryError {
    QueryError::Syntax {
        offset,
        message: message.into(),
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek(0).is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n')) {
            self.pos += 1;
        }
    }

    /// Next non-whitespace character after the current position.
    fn peek_past_whitespace(&self) -> (Option<char>, Option<char>) {
        let mut index = self.pos;
        while self
            .chars
            .get(index)
            .is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        {
            index += 1;
        }
        (self.chars.get(index).copied(), self.chars.get(index + 1).copied())
    }

    fn operator_expected(&self) -> bool {
        self.tokens.last().is_some_and(|(token, _)| token.ends_operand())
    }

    fn ncname(&mut self) -> String {
        let start = self.pos;
        while self.peek(0).is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn push(&mut self, token: Token, offset: usize) {
        self.tokens.push((token, offset));
    }

    fn run(mut self) -> Result<Vec<Spanned>, QueryError> {
        loop {
            self.skip_whitespace();
            let offset = self.pos;
            let Some(ch) = self.peek(0) else {
                break;
            };

            let token = match ch {
                '(' => self.single(Token::LParen),
                ')' => self.single(Token::RParen),
                '[' => self.single(Token::LBracket),
                ']' => self.single(Token::RBracket),
                ',' => self.single(Token::Comma),
                '@' => self.single(Token::At),
                '|' => self.single(Token::Pipe),
                '+' => self.single(Token::Plus),
                '-' => self.single(Token::Minus),
                '=' => self.single(Token::Eq),
                '!' if self.peek(1) == Some('=') => self.double(Token::Neq),
                '<' if self.peek(1) == Some('=') => self.double(Token::Le),
                '<' => self.single(Token::Lt),
                '>' if self.peek(1) == Some('=') => self.double(Token::Ge),
                '>' => self.single(Token::Gt),
                '/' if self.peek(1) == Some('/') => self.double(Token::DoubleSlash),
                '/' => self.single(Token::Slash),
                ':' if self.peek(1) == Some(':') => self.double(Token::ColonColon),
                '.' if self.peek(1) == Some('.') => self.double(Token::DotDot),
                '.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
                '.' => self.single(Token::Dot),
                '*' => {
                    self.pos += 1;
                    if self.operator_expected() {
                        Token::Multiply
                    } else {
                        Token::Star
                    }
                }
                '"' | '\'' => self.literal(ch, offset)?,
                '$' => {
                    self.pos += 1;
                    Token::Variable(self.ncname())
                }
                c if c.is_ascii_digit() => self.number(),
                c if is_name_start(c) => self.name(offset)?,
                other => return Err(syntax(offset, format!("unexpected character '{other}'"))),
            };
            self.push(token, offset);
        }
        Ok(self.tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.pos += 1;
        token
    }

    fn double(&mut self, token: Token) -> Token {
        self.pos += 2;
        token
    }

    fn literal(&mut self, quote: char, offset: usize) -> Result<Token, QueryError> {
        self.pos += 1;
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek(0).is_none() {
            return Err(syntax(offset, "unterminated string literal"));
        }
        let value = self.chars[start..self.pos].iter().collect();
        self.pos += 1;
        Ok(Token::Literal(value))
    }

    fn number(&mut self) -> Token {
        let start = self.pos;
        while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek(0) == Some('.') {
            self.pos += 1;
            while self.peek(0).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::Number(text.parse().unwrap_or(f64::NAN))
    }

    fn name(&mut self, offset: usize) -> Result<Token, QueryError> {
        let first = self.ncname();

        if self.operator_expected() {
            return match first.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "div" => Ok(Token::Div),
                "mod" => Ok(Token::Mod),
                _ => Err(syntax(offset, format!("expected an operator, found '{first}'"))),
            };
        }

        // prefix:local or prefix:*
        let mut name = first;
        if self.peek(0) == Some(':') && self.peek(1) != Some(':') {
            match self.peek(1) {
                Some('*') => {
                    self.pos += 2;
                    return Ok(Token::PrefixWildcard(name));
                }
                Some(c) if is_name_start(c) => {
                    self.pos += 1;
                    let local = self.ncname();
                    name = format!("{name}:{local}");
                }
                _ => return Err(syntax(self.pos, "expected a local name after ':'")),
            }
        }

        match self.peek_past_whitespace() {
            (Some('('), _) => {
                self.skip_whitespace();
                if NODE_TYPES.contains(&name.as_str()) {
                    Ok(Token::NodeType(name))
                } else {
                    Ok(Token::FunctionName(name))
                }
            }
            (Some(':'), Some(':')) => {
                self.skip_whitespace();
                Ok(Token::AxisName(name))
            }
            _ => Ok(Token::Name(name)),
        }
    }
}

/// Split an expression into tokens.
pub(crate) fn tokenize(expression: &str) -> Result<Vec<Spanned>, QueryError> {
    Lexer {
        chars: expression.chars().collect(),
        pos: 0,
        tokens: Vec::new(),
    }
    .run()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(expression: &str) -> Vec<Token> {
        tokenize(expression)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_star_disambiguation() {
        assert_eq!(
            kinds("*/a * 2"),
            vec![
                Token::Star,
                Token::Slash,
                Token::Name("a".to_owned()),
                Token::Multiply,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(
            kinds("and or div"),
            vec![
                Token::Name("and".to_owned()),
                Token::Or,
                Token::Name("div".to_owned()),
            ]
        );
    }

    #[test]
    fn test_qualified_names_and_axes() {
        assert_eq!(
            kinds("ancestor :: ac:structured-macro/ri:*"),
            vec![
                Token::AxisName("ancestor".to_owned()),
                Token::ColonColon,
                Token::Name("ac:structured-macro".to_owned()),
                Token::Slash,
                Token::PrefixWildcard("ri".to_owned()),
            ]
        );
    }

    #[test]
    fn test_functions_and_node_types() {
        assert_eq!(
            kinds("starts-with(text (), 've4-')"),
            vec![
                Token::FunctionName("starts-with".to_owned()),
                Token::LParen,
                Token::NodeType("text".to_owned()),
                Token::LParen,
                Token::RParen,
                Token::Comma,
                Token::Literal("ve4-".to_owned()),
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_numbers_and_dots() {
        assert_eq!(
            kinds(".. . .5 1.25"),
            vec![Token::DotDot, Token::Dot, Token::Number(0.5), Token::Number(1.25)]
        );
    }

    #[test]
    fn test_unterminated_literal() {
        assert!(matches!(
            tokenize("a[@b='x]"),
            Err(QueryError::Syntax { offset: 5, .. })
        ));
    }
}
