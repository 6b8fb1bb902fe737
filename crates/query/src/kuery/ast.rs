//! KQL syntax tree

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::wildcard_match;

/// A node of the KQL syntax tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KueryNode {
    /// A literal value (or a field name)
    Literal(Literal),
    /// A value or field name containing `*`
    Wildcard(Wildcard),
    /// A boolean or matching function
    Function {
        /// Function name
        name: FunctionName,
        /// Ordered arguments
        arguments: Vec<KueryNode>,
    },
    /// A range comparison on a field
    Range(RangeNode),
}

impl KueryNode {
    /// Conjunction of `nodes`
    pub fn and(nodes: Vec<KueryNode>) -> Self {
        Self::Function {
            name: FunctionName::And,
            arguments: nodes,
        }
    }

    /// Disjunction of `nodes`
    pub fn or(nodes: Vec<KueryNode>) -> Self {
        Self::Function {
            name: FunctionName::Or,
            arguments: nodes,
        }
    }

    /// Negation of `node`
    pub fn not(node: KueryNode) -> Self {
        Self::Function {
            name: FunctionName::Not,
            arguments: vec![node],
        }
    }

    /// `field` matches `value`; a null `field` literal means any field
    pub fn is(field: KueryNode, value: KueryNode) -> Self {
        Self::Function {
            name: FunctionName::Is,
            arguments: vec![field, value],
        }
    }

    /// `field` has a value
    pub fn exists(field: KueryNode) -> Self {
        Self::Function {
            name: FunctionName::Exists,
            arguments: vec![field],
        }
    }

    /// Whether this is `and` with no arguments (the empty query)
    pub fn is_empty_and(&self) -> bool {
        matches!(self, Self::Function { name: FunctionName::And, arguments } if arguments.is_empty())
    }
}

/// Closed set of KQL functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionName {
    Is,
    And,
    Or,
    Not,
    Exists,
}

impl FunctionName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Is => "is",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Exists => "exists",
        }
    }
}

// =============================================================================
// Literals
// =============================================================================

/// Typed literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// Placeholder for "any field" in `is`
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
}

/// A literal with its quoting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    /// Value
    pub value: LiteralValue,
    /// Whether the literal was written in double quotes
    #[serde(default)]
    pub quoted: bool,
}

impl Literal {
    /// The null literal
    pub fn null() -> Self {
        Self {
            value: LiteralValue::Null,
            quoted: false,
        }
    }

    /// An unquoted string literal
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            value: LiteralValue::String(s.into()),
            quoted: false,
        }
    }

    /// A quoted string literal
    pub fn quoted(s: impl Into<String>) -> Self {
        Self {
            value: LiteralValue::String(s.into()),
            quoted: true,
        }
    }

    /// Type an unquoted word: booleans and plain numbers become typed values
    ///
    /// Numbers with leading zeros (`007`) stay strings so identifiers keep
    /// their spelling.
    pub fn from_unquoted(text: &str) -> Self {
        let value = match text {
            "true" => LiteralValue::Bool(true),
            "false" => LiteralValue::Bool(false),
            _ => match parse_number(text) {
                Some(n) => LiteralValue::Number(n),
                None => LiteralValue::String(text.to_string()),
            },
        };
        Self {
            value,
            quoted: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value == LiteralValue::Null
    }

    /// JSON form of the value
    pub fn to_json(&self) -> Value {
        match &self.value {
            LiteralValue::Null => Value::Null,
            LiteralValue::Bool(b) => Value::Bool(*b),
            LiteralValue::Number(n) => Value::Number(n.clone()),
            LiteralValue::String(s) => Value::String(s.clone()),
        }
    }

    /// Text form of the value
    pub fn text(&self) -> String {
        match &self.value {
            LiteralValue::Null => String::new(),
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::Number(n) => n.to_string(),
            LiteralValue::String(s) => s.clone(),
        }
    }
}

fn parse_number(text: &str) -> Option<serde_json::Number> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int, frac) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    if int.is_empty() || !int.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if int.len() > 1 && int.starts_with('0') {
        return None;
    }
    match frac {
        None => text.parse::<i64>().ok().map(serde_json::Number::from),
        Some(f) if !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()) => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64),
        Some(_) => None,
    }
}

// =============================================================================
// Wildcards
// =============================================================================

/// One piece of a wildcard pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WildcardPart {
    /// Literal text
    Literal(String),
    /// `*`
    Any,
}

/// A pattern with at least one `*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wildcard {
    /// Pattern pieces in order
    pub parts: Vec<WildcardPart>,
}

impl Wildcard {
    pub fn new(parts: Vec<WildcardPart>) -> Self {
        Self { parts }
    }

    /// Whether the pattern is exactly `*`
    pub fn is_match_all(&self) -> bool {
        self.parts == [WildcardPart::Any]
    }

    /// Whether the pattern starts with `*`
    pub fn has_leading_wildcard(&self) -> bool {
        self.parts.first() == Some(&WildcardPart::Any)
    }

    /// Plain pattern with unescaped `*`, for matching field names
    pub fn to_pattern(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                WildcardPart::Literal(s) => s.as_str(),
                WildcardPart::Any => "*",
            })
            .collect()
    }

    /// Lucene query string form: literal text escaped, `*` left live
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                WildcardPart::Literal(s) => out.push_str(&escape_query_string(s)),
                WildcardPart::Any => out.push('*'),
            }
        }
        out
    }

    /// Whether `name` matches this pattern
    pub fn matches(&self, name: &str) -> bool {
        wildcard_match(&self.to_pattern(), name)
    }
}

impl fmt::Display for Wildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_pattern())
    }
}

/// Escape lucene query string syntax characters
pub fn escape_query_string(s: &str) -> String {
    const RESERVED: &[char] = &[
        '\\', '+', '-', '=', '&', '|', '>', '<', '!', '(', ')', '{', '}', '[', ']', '^', '"',
        '~', '*', '?', ':', '/', ' ',
    ];
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Ranges
// =============================================================================

/// Range comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeOperator {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOperator {
    /// DSL key (`gt`, `gte`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// KQL symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }
}

/// `field <op> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeNode {
    pub field: String,
    pub operator: RangeOperator,
    pub value: Literal,
}
