//! Index pattern and field metadata
//!
//! Read-only input supplied by the caller on every call. Nothing in the
//! engine mutates or caches it.

use serde::{Deserialize, Serialize};

/// Field type as seen by the query engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Text or keyword
    String,
    /// Any numeric type
    Number,
    /// Date or date_nanos
    Date,
    /// Boolean
    Boolean,
    /// IP address
    Ip,
    /// Geo point
    GeoPoint,
    /// Anything the engine has no special handling for
    Unknown,
}

/// A single field of an index pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Full field name (dot notation)
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Whether the field is indexed for search
    #[serde(default = "default_true")]
    pub searchable: bool,
    /// Whether the field can be aggregated on
    #[serde(default = "default_true")]
    pub aggregatable: bool,
}

fn default_true() -> bool {
    true
}

impl Field {
    /// Create a searchable, aggregatable field
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            searchable: true,
            aggregatable: true,
        }
    }

    /// Mark the field as not aggregatable (e.g. analyzed text)
    pub fn not_aggregatable(mut self) -> Self {
        self.aggregatable = false;
        self
    }

    /// Whether free-text queries should search this field
    pub fn is_text(&self) -> bool {
        self.searchable && self.kind == FieldKind::String
    }
}

/// An index pattern: a search target plus its field list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPattern {
    /// Stable identifier
    pub id: String,
    /// Index expression sent to the backend (e.g. `logs-*`)
    pub title: String,
    /// Primary time field, if the pattern is time based
    #[serde(default)]
    pub time_field: Option<String>,
    /// Known fields
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl IndexPattern {
    /// Create an index pattern with no fields
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            time_field: None,
            fields: Vec::new(),
        }
    }

    /// Set the time field
    pub fn with_time_field(mut self, field: impl Into<String>) -> Self {
        self.time_field = Some(field.into());
        self
    }

    /// Add a field
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Look up a field by exact name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether a field with this exact name exists
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Fields whose names match a `*` wildcard pattern, in declaration order
    pub fn fields_matching(&self, pattern: &str) -> Vec<&Field> {
        self.fields
            .iter()
            .filter(|f| wildcard_match(pattern, &f.name))
            .collect()
    }

    /// Names of all searchable string fields
    pub fn text_field_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.is_text())
            .map(|f| f.name.clone())
            .collect()
    }
}

/// Match `name` against a pattern where `*` matches any run of characters
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // Greedy match with backtracking to the last star
    let (mut p, mut n) = (0, 0);
    let mut star: Option<usize> = None;
    let mut star_n = 0;

    while n < name.len() {
        if p < pattern.len() && pattern[p] != '*' && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_n = n;
            p += 1;
        } else if let Some(s) = star {
            p = s + 1;
            star_n += 1;
            n = star_n;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
