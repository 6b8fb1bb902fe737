//! KQL tokenizer
//!
//! Positions are character offsets into the original input so errors can be
//! highlighted by the caller.

use super::ast::{RangeOperator, WildcardPart};
use crate::error::{QueryError, Result};

/// Characters that end an unquoted word unless escaped
const SPECIAL: &[char] = &['\\', '(', ')', ':', '<', '>', '"', '{', '}'];

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    LParen,
    RParen,
    Colon,
    Range(RangeOperator),
    And,
    Or,
    Not,
    /// Unquoted word; contains `Any` parts for unescaped `*`
    Word(Vec<WildcardPart>),
    /// Double-quoted string, escapes resolved
    Quoted(String),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Character offset of the first character
    pub position: usize,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            Self::LParen => "'('".to_string(),
            Self::RParen => "')'".to_string(),
            Self::Colon => "':'".to_string(),
            Self::Range(op) => format!("'{}'", op.symbol()),
            Self::And => "'and'".to_string(),
            Self::Or => "'or'".to_string(),
            Self::Not => "'not'".to_string(),
            Self::Word(parts) => format!("'{}'", word_text(parts)),
            Self::Quoted(s) => format!("\"{}\"", s),
            Self::Eof => "end of input".to_string(),
        }
    }
}

/// Literal text of a word, with `*` for wildcard parts
pub(crate) fn word_text(parts: &[WildcardPart]) -> String {
    parts
        .iter()
        .map(|p| match p {
            WildcardPart::Literal(s) => s.as_str(),
            WildcardPart::Any => "*",
        })
        .collect()
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            ':' => {
                i += 1;
                TokenKind::Colon
            }
            '<' | '>' => {
                i += 1;
                let inclusive = chars.get(i) == Some(&'=');
                if inclusive {
                    i += 1;
                }
                TokenKind::Range(match (c, inclusive) {
                    ('<', false) => RangeOperator::Lt,
                    ('<', true) => RangeOperator::Lte,
                    ('>', false) => RangeOperator::Gt,
                    _ => RangeOperator::Gte,
                })
            }
            '"' => {
                let (text, next) = read_quoted(&chars, i)?;
                i = next;
                TokenKind::Quoted(text)
            }
            '{' | '}' => {
                return Err(QueryError::syntax(
                    start,
                    format!("unexpected '{}', nested field queries are not supported", c),
                ));
            }
            _ => {
                let (parts, escaped, next) = read_word(&chars, i)?;
                i = next;
                keyword(&parts, escaped).unwrap_or(TokenKind::Word(parts))
            }
        };

        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        position: chars.len(),
    });
    Ok(tokens)
}

fn read_quoted(chars: &[char], open: usize) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let Some(&next) = chars.get(i + 1) else {
                    return Err(QueryError::syntax(i, "dangling escape at end of input"));
                };
                text.push(next);
                i += 2;
            }
            '"' => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(QueryError::syntax(open, "unterminated quoted string"))
}

/// Read an unquoted word. Returns its parts, whether any escape was used,
/// and the offset after it.
fn read_word(chars: &[char], start: usize) -> Result<(Vec<WildcardPart>, bool, usize)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            break;
        }
        if c == '\\' {
            let Some(&next) = chars.get(i + 1) else {
                return Err(QueryError::syntax(i, "dangling escape at end of input"));
            };
            current.push(next);
            escaped = true;
            i += 2;
            continue;
        }
        if SPECIAL.contains(&c) {
            break;
        }
        if c == '*' {
            if !current.is_empty() {
                parts.push(WildcardPart::Literal(std::mem::take(&mut current)));
            }
            parts.push(WildcardPart::Any);
        } else {
            current.push(c);
        }
        i += 1;
    }

    if !current.is_empty() {
        parts.push(WildcardPart::Literal(current));
    }
    Ok((parts, escaped, i))
}

fn keyword(parts: &[WildcardPart], escaped: bool) -> Option<TokenKind> {
    if escaped {
        return None;
    }
    let [WildcardPart::Literal(word)] = parts else {
        return None;
    };
    match word.to_lowercase().as_str() {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Not),
        _ => None,
    }
}
