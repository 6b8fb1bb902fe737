//! Query text tagged with its language

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// KQL
    #[default]
    Kuery,
    /// Lucene query string syntax
    Lucene,
    /// SQL (executed by a separate search strategy)
    Sql,
    /// Piped processing language (executed by a separate search strategy)
    Ppl,
}

impl Language {
    /// Parse a language name
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kuery" | "kql" => Ok(Self::Kuery),
            "lucene" => Ok(Self::Lucene),
            "sql" => Ok(Self::Sql),
            "ppl" => Ok(Self::Ppl),
            other => Err(QueryError::UnsupportedLanguage(other.to_string())),
        }
    }

    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kuery => "kuery",
            Self::Lucene => "lucene",
            Self::Sql => "sql",
            Self::Ppl => "ppl",
        }
    }

    /// Whether queries in this language lower to the structured query DSL
    pub fn has_dsl_lowering(&self) -> bool {
        matches!(self, Self::Kuery | Self::Lucene)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user query. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    language: Language,
    query: String,
}

impl Query {
    /// Create a query in the given language
    pub fn new(language: Language, query: impl Into<String>) -> Self {
        Self {
            language,
            query: query.into(),
        }
    }

    /// Create a KQL query
    pub fn kuery(query: impl Into<String>) -> Self {
        Self::new(Language::Kuery, query)
    }

    /// Create a lucene query
    pub fn lucene(query: impl Into<String>) -> Self {
        Self::new(Language::Lucene, query)
    }

    /// Query language
    pub fn language(&self) -> Language {
        self.language
    }

    /// Query text
    pub fn text(&self) -> &str {
        &self.query
    }

    /// Whether the query text is empty or whitespace
    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty()
    }
}
