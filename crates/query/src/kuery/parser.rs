//! Recursive descent KQL parser
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! query   := or? EOF
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | primary
//! primary := "(" or ")" | field ":" target | field OP value | value
//! target  := "(" vor ")" | value
//! vor     := vand ("or" vand)*
//! vand    := vnot ("and" vnot)*
//! vnot    := "not" vnot | "(" vor ")" | value
//! value   := QUOTED | WORD+
//! ```
//!
//! Groups and `not` nest at most [`MAX_NESTING_DEPTH`] levels deep.

use super::ast::{KueryNode, Literal, RangeNode, Wildcard, WildcardPart};
use super::lexer::{Token, TokenKind, tokenize, word_text};
use crate::error::{QueryError, Result};

/// Deepest group or `not` nesting a query may use
pub const MAX_NESTING_DEPTH: usize = 256;

/// Parser switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Accept values starting with `*`
    pub allow_leading_wildcards: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_leading_wildcards: true,
        }
    }
}

/// Parse a KQL query
///
/// The empty query parses to an `and` with no arguments.
pub fn parse(input: &str) -> Result<KueryNode> {
    parse_with_options(input, ParseOptions::default())
}

/// Parse a KQL query with explicit options
pub fn parse_with_options(input: &str, options: ParseOptions) -> Result<KueryNode> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        options,
    };

    if parser.peek() == &TokenKind::Eof {
        return Ok(KueryNode::and(Vec::new()));
    }

    let node = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    options: ParseOptions,
}

/// Value read from one or more tokens
enum RawValue {
    Quoted(String),
    Unquoted(Vec<WildcardPart>),
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn position(&self) -> usize {
        self.tokens[self.pos.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> QueryError {
        QueryError::syntax(
            self.position(),
            format!("expected {}, found {}", expected, self.peek().describe()),
        )
    }

    fn expect_eof(&self) -> Result<()> {
        match self.peek() {
            TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected("'and', 'or' or end of input")),
        }
    }

    /// Run `f` one nesting level deeper, failing at the current token once
    /// the limit is reached
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(QueryError::syntax(
                self.position(),
                format!("query nests deeper than {} levels", MAX_NESTING_DEPTH),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect_rparen(&mut self) -> Result<()> {
        match self.peek() {
            TokenKind::RParen => {
                self.advance();
                Ok(())
            }
            _ => Err(self.unexpected("')'")),
        }
    }

    // =========================================================================
    // Boolean structure
    // =========================================================================

    fn parse_or(&mut self) -> Result<KueryNode> {
        let mut nodes = vec![self.parse_and()?];
        while self.peek() == &TokenKind::Or {
            self.advance();
            nodes.push(self.parse_and()?);
        }
        Ok(collapse(nodes, KueryNode::or))
    }

    fn parse_and(&mut self) -> Result<KueryNode> {
        let mut nodes = vec![self.parse_not()?];
        while self.peek() == &TokenKind::And {
            self.advance();
            nodes.push(self.parse_not()?);
        }
        Ok(collapse(nodes, KueryNode::and))
    }

    fn parse_not(&mut self) -> Result<KueryNode> {
        if self.peek() == &TokenKind::Not {
            return self.nested(|p| {
                p.advance();
                Ok(KueryNode::not(p.parse_not()?))
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<KueryNode> {
        match self.peek().clone() {
            TokenKind::LParen => self.nested(|p| {
                p.advance();
                let node = p.parse_or()?;
                p.expect_rparen()?;
                Ok(node)
            }),
            TokenKind::Word(parts) => match self.peek_at(1) {
                TokenKind::Colon => {
                    self.advance();
                    self.advance();
                    let field = self.field_node(&parts);
                    self.parse_target(&field)
                }
                TokenKind::Range(_) => {
                    let position = self.position();
                    if parts.contains(&WildcardPart::Any) {
                        return Err(QueryError::syntax(
                            position,
                            "wildcard field names are not allowed in range queries",
                        ));
                    }
                    self.advance();
                    self.parse_range(word_text(&parts))
                }
                _ => self.parse_free_text(),
            },
            TokenKind::Quoted(text) => {
                if self.peek_at(1) == &TokenKind::Colon {
                    self.advance();
                    self.advance();
                    let field = KueryNode::Literal(Literal::quoted(text));
                    self.parse_target(&field)
                } else {
                    self.parse_free_text()
                }
            }
            _ => Err(self.unexpected("a field, value or '('")),
        }
    }

    fn parse_free_text(&mut self) -> Result<KueryNode> {
        let value = self.parse_value()?;
        Ok(KueryNode::is(KueryNode::Literal(Literal::null()), value))
    }

    fn parse_range(&mut self, field: String) -> Result<KueryNode> {
        let TokenKind::Range(operator) = self.advance().kind else {
            return Err(self.unexpected("a range operator"));
        };
        let position = self.position();
        let value = match self.advance().kind {
            TokenKind::Quoted(text) => Literal::quoted(text),
            TokenKind::Word(parts) if !parts.contains(&WildcardPart::Any) => {
                Literal::from_unquoted(&word_text(&parts))
            }
            TokenKind::Word(_) => {
                return Err(QueryError::syntax(
                    position,
                    "wildcards are not allowed in range values",
                ));
            }
            other => {
                return Err(QueryError::syntax(
                    position,
                    format!("expected a range value, found {}", other.describe()),
                ));
            }
        };
        Ok(KueryNode::Range(RangeNode {
            field,
            operator,
            value,
        }))
    }

    // =========================================================================
    // Field values
    // =========================================================================

    fn field_node(&self, parts: &[WildcardPart]) -> KueryNode {
        if parts.contains(&WildcardPart::Any) {
            KueryNode::Wildcard(Wildcard::new(parts.to_vec()))
        } else {
            KueryNode::Literal(Literal::string(word_text(parts)))
        }
    }

    fn parse_target(&mut self, field: &KueryNode) -> Result<KueryNode> {
        if self.peek() == &TokenKind::LParen {
            return self.nested(|p| p.parse_value_group(field));
        }
        self.parse_field_value(field)
    }

    fn parse_value_group(&mut self, field: &KueryNode) -> Result<KueryNode> {
        self.advance();
        let node = self.parse_value_or(field)?;
        self.expect_rparen()?;
        Ok(node)
    }

    fn parse_value_or(&mut self, field: &KueryNode) -> Result<KueryNode> {
        let mut nodes = vec![self.parse_value_and(field)?];
        while self.peek() == &TokenKind::Or {
            self.advance();
            nodes.push(self.parse_value_and(field)?);
        }
        Ok(collapse(nodes, KueryNode::or))
    }

    fn parse_value_and(&mut self, field: &KueryNode) -> Result<KueryNode> {
        let mut nodes = vec![self.parse_value_not(field)?];
        while self.peek() == &TokenKind::And {
            self.advance();
            nodes.push(self.parse_value_not(field)?);
        }
        Ok(collapse(nodes, KueryNode::and))
    }

    fn parse_value_not(&mut self, field: &KueryNode) -> Result<KueryNode> {
        match self.peek() {
            TokenKind::Not => self.nested(|p| {
                p.advance();
                Ok(KueryNode::not(p.parse_value_not(field)?))
            }),
            TokenKind::LParen => self.nested(|p| p.parse_value_group(field)),
            _ => self.parse_field_value(field),
        }
    }

    fn parse_field_value(&mut self, field: &KueryNode) -> Result<KueryNode> {
        let value = self.parse_value()?;
        if let KueryNode::Wildcard(wildcard) = &value
            && wildcard.is_match_all()
        {
            return Ok(KueryNode::exists(field.clone()));
        }
        Ok(KueryNode::is(field.clone(), value))
    }

    /// Read a value: one quoted string, or a run of unquoted words
    fn parse_value(&mut self) -> Result<KueryNode> {
        let position = self.position();
        let raw = match self.peek().clone() {
            TokenKind::Quoted(text) => {
                self.advance();
                RawValue::Quoted(text)
            }
            TokenKind::Word(parts) => {
                self.advance();
                let mut all = parts;
                while let TokenKind::Word(next) = self.peek().clone() {
                    self.advance();
                    push_literal(&mut all, " ");
                    for part in next {
                        match part {
                            WildcardPart::Literal(s) => push_literal(&mut all, &s),
                            WildcardPart::Any => all.push(WildcardPart::Any),
                        }
                    }
                }
                RawValue::Unquoted(all)
            }
            _ => return Err(self.unexpected("a value")),
        };

        match raw {
            RawValue::Quoted(text) => Ok(KueryNode::Literal(Literal::quoted(text))),
            RawValue::Unquoted(parts) if parts.contains(&WildcardPart::Any) => {
                let wildcard = Wildcard::new(parts);
                if !self.options.allow_leading_wildcards
                    && wildcard.has_leading_wildcard()
                    && !wildcard.is_match_all()
                {
                    return Err(QueryError::syntax(
                        position,
                        "leading wildcards are disabled",
                    ));
                }
                Ok(KueryNode::Wildcard(wildcard))
            }
            RawValue::Unquoted(parts) => Ok(KueryNode::Literal(Literal::from_unquoted(
                &word_text(&parts),
            ))),
        }
    }
}

/// Join adjacent literal text so "a b" stays one part
fn push_literal(parts: &mut Vec<WildcardPart>, text: &str) {
    if let Some(WildcardPart::Literal(last)) = parts.last_mut() {
        last.push_str(text);
    } else {
        parts.push(WildcardPart::Literal(text.to_string()));
    }
}

/// A single operand is returned as is; several are wrapped by `make`
fn collapse(mut nodes: Vec<KueryNode>, make: fn(Vec<KueryNode>) -> KueryNode) -> KueryNode {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        make(nodes)
    }
}
