//! Filter model
//!
//! A filter is a structured predicate applied independently of the free-text
//! query. It carries display/behavior metadata (`meta`), a structured query
//! fragment (`query`), and the store it belongs to (`state`).
//!
//! Filters are value objects: every helper here returns a new `Filter`
//! instead of mutating in place.

mod compare;
mod generate;
mod time;

#[cfg(test)]
mod filter_test;

pub use compare::{
    CompareOptions, compare_filter_lists, compare_filters, dedup_filters,
    only_disabled_filters_changed, uniq_filters,
};
pub use generate::{
    FilterOperation, generate_filters, map_and_flatten_filters, map_filter, migrate_filter,
};
pub use time::{change_time_filter, convert_range_filter_to_time_range, extract_time_filter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{QueryError, Result};
use crate::field::{Field, FieldKind, IndexPattern};

/// Filter type, derived from the shape of the query fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    /// Single value match (`match_phrase`)
    Phrase,
    /// Any of several values (`bool.should` of `match_phrase`)
    Phrases,
    /// Numeric or date range
    Range,
    /// Field has a value
    Exists,
    /// Field has no value (legacy `missing` fragment)
    Missing,
    /// Lucene query string
    QueryString,
    /// Arbitrary DSL fragment
    Custom,
}

impl FilterType {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phrase => "phrase",
            Self::Phrases => "phrases",
            Self::Range => "range",
            Self::Exists => "exists",
            Self::Missing => "missing",
            Self::QueryString => "query_string",
            Self::Custom => "custom",
        }
    }
}

/// Which store a filter lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterState {
    /// Scoped to the current app
    #[default]
    App,
    /// Pinned across apps
    Global,
}

/// Filter metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterMeta {
    /// Invert the predicate
    #[serde(default)]
    pub negate: bool,
    /// Keep the filter but do not apply it
    #[serde(default)]
    pub disabled: bool,
    /// Filter type
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Custom display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Field the filter applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Display value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Index pattern id the filter was created for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Type-specific parameters (opaque to the builder)
    #[serde(default)]
    pub params: Value,
}

impl FilterMeta {
    fn new(filter_type: FilterType) -> Self {
        Self {
            negate: false,
            disabled: false,
            filter_type,
            alias: None,
            key: None,
            value: None,
            index: None,
            params: Value::Null,
        }
    }
}

/// A filter: metadata, query fragment and store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Metadata
    pub meta: FilterMeta,
    /// Structured query fragment
    pub query: Value,
    /// Store
    #[serde(default)]
    pub state: FilterState,
}

/// Bounds for a range filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeParams {
    /// Greater than or equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<Value>,
    /// Strictly greater than
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<Value>,
    /// Less than or equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<Value>,
    /// Strictly less than
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<Value>,
    /// Date format of the bounds (date fields only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl RangeParams {
    /// Inclusive range `[gte, lte]`
    pub fn between(gte: impl Into<Value>, lte: impl Into<Value>) -> Self {
        Self {
            gte: Some(gte.into()),
            lte: Some(lte.into()),
            ..Default::default()
        }
    }

    /// Whether at least one bound is set
    pub fn has_bound(&self) -> bool {
        self.gte.is_some() || self.gt.is_some() || self.lte.is_some() || self.lt.is_some()
    }

    fn bounds(&self) -> impl Iterator<Item = &Value> {
        [&self.gte, &self.gt, &self.lte, &self.lt]
            .into_iter()
            .filter_map(|b| b.as_ref())
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Build a phrase filter: `field` equals `value`
pub fn build_phrase_filter(
    field: &Field,
    value: impl Into<Value>,
    index: &IndexPattern,
) -> Result<Filter> {
    require_field_name("phrase", field)?;
    let value = value.into();
    require_scalar("phrase", &value)?;

    let mut meta = FilterMeta::new(FilterType::Phrase);
    meta.key = Some(field.name.clone());
    meta.value = Some(display_scalar(&value));
    meta.params = json!({ "query": value });
    meta.index = Some(index.id.clone());

    Ok(Filter {
        query: phrase_query(&field.name, &value),
        meta,
        state: FilterState::App,
    })
}

/// Build a phrases filter: `field` equals any of `values`
pub fn build_phrases_filter(
    field: &Field,
    values: &[Value],
    index: &IndexPattern,
) -> Result<Filter> {
    require_field_name("phrases", field)?;
    if values.is_empty() {
        return Err(QueryError::invalid_filter(
            "phrases",
            format!("no values given for field '{}'", field.name),
        ));
    }
    for value in values {
        require_scalar("phrases", value)?;
    }

    let mut meta = FilterMeta::new(FilterType::Phrases);
    meta.key = Some(field.name.clone());
    meta.value = Some(display_values(values));
    meta.params = Value::Array(values.to_vec());
    meta.index = Some(index.id.clone());

    Ok(Filter {
        query: phrases_query(&field.name, values),
        meta,
        state: FilterState::App,
    })
}

/// Build a range filter on a number, date or ip field
pub fn build_range_filter(
    field: &Field,
    params: RangeParams,
    index: &IndexPattern,
) -> Result<Filter> {
    require_field_name("range", field)?;
    if !params.has_bound() {
        return Err(QueryError::invalid_filter(
            "range",
            format!("no bounds given for field '{}'", field.name),
        ));
    }
    if field.kind == FieldKind::Number {
        for bound in params.bounds() {
            if !is_numeric(bound) {
                return Err(QueryError::invalid_filter(
                    "range",
                    format!("bound {} is not numeric for field '{}'", bound, field.name),
                ));
            }
        }
    }
    if params.format.is_some() && field.kind != FieldKind::Date {
        return Err(QueryError::invalid_filter(
            "range",
            format!("format is only valid on date fields, '{}' is not one", field.name),
        ));
    }

    let params_value = serde_json::to_value(&params).unwrap_or(Value::Null);

    let mut meta = FilterMeta::new(FilterType::Range);
    meta.key = Some(field.name.clone());
    meta.value = Some(display_range(&params));
    meta.params = params_value.clone();
    meta.index = Some(index.id.clone());

    Ok(Filter {
        query: json!({ "range": { field.name.clone(): params_value } }),
        meta,
        state: FilterState::App,
    })
}

/// Build an exists filter: `field` has any value
pub fn build_exists_filter(field: &Field, index: &IndexPattern) -> Result<Filter> {
    require_field_name("exists", field)?;

    let mut meta = FilterMeta::new(FilterType::Exists);
    meta.key = Some(field.name.clone());
    meta.value = Some("exists".to_string());
    meta.index = Some(index.id.clone());

    Ok(Filter {
        query: json!({ "exists": { "field": field.name } }),
        meta,
        state: FilterState::App,
    })
}

/// Build a filter from a raw DSL fragment
///
/// Fragments containing a `query_string` clause are typed as query string
/// filters, everything else as custom.
pub fn build_query_filter(
    query: Value,
    index: &IndexPattern,
    alias: Option<String>,
) -> Result<Filter> {
    let Some(object) = query.as_object() else {
        return Err(QueryError::invalid_filter(
            "query",
            "query fragment must be a JSON object",
        ));
    };
    if object.is_empty() {
        return Err(QueryError::invalid_filter("query", "query fragment is empty"));
    }

    let filter_type = if object.contains_key("query_string") {
        FilterType::QueryString
    } else {
        FilterType::Custom
    };

    let mut meta = FilterMeta::new(filter_type);
    meta.alias = alias;
    meta.index = Some(index.id.clone());
    if let Some(text) = query.pointer("/query_string/query").and_then(Value::as_str) {
        meta.value = Some(text.to_string());
    }

    Ok(Filter {
        query,
        meta,
        state: FilterState::App,
    })
}

/// Build a custom filter with explicit flags
pub fn build_custom_filter(
    index: &IndexPattern,
    query: Value,
    disabled: bool,
    negate: bool,
    alias: Option<String>,
    state: FilterState,
) -> Result<Filter> {
    let mut filter = build_query_filter(query, index, alias)?;
    filter.meta.filter_type = FilterType::Custom;
    filter.meta.disabled = disabled;
    filter.meta.negate = negate;
    filter.state = state;
    Ok(filter)
}

/// Build a match-all placeholder filter
pub fn build_empty_filter(pinned: bool, index: Option<&IndexPattern>) -> Filter {
    let mut meta = FilterMeta::new(FilterType::Custom);
    meta.index = index.map(|i| i.id.clone());

    Filter {
        query: json!({ "match_all": {} }),
        meta,
        state: if pinned {
            FilterState::Global
        } else {
            FilterState::App
        },
    }
}

// =============================================================================
// Filter helpers
// =============================================================================

impl Filter {
    /// Whether the filter is pinned (global store)
    pub fn is_pinned(&self) -> bool {
        self.state == FilterState::Global
    }

    /// Whether the filter is applied
    pub fn is_enabled(&self) -> bool {
        !self.meta.disabled
    }

    /// Copy with `negate` flipped
    pub fn toggle_negated(&self) -> Self {
        let mut filter = self.clone();
        filter.meta.negate = !filter.meta.negate;
        filter
    }

    /// Copy with `disabled` flipped
    pub fn toggle_disabled(&self) -> Self {
        let mut filter = self.clone();
        filter.meta.disabled = !filter.meta.disabled;
        filter
    }

    /// Copy with `disabled` set
    pub fn disable(&self) -> Self {
        self.with_disabled(true)
    }

    /// Copy with `disabled` cleared
    pub fn enable(&self) -> Self {
        self.with_disabled(false)
    }

    /// Copy with the given `disabled` flag
    pub fn with_disabled(&self, disabled: bool) -> Self {
        let mut filter = self.clone();
        filter.meta.disabled = disabled;
        filter
    }

    /// Copy with the given `negate` flag
    pub fn with_negate(&self, negate: bool) -> Self {
        let mut filter = self.clone();
        filter.meta.negate = negate;
        filter
    }

    /// Copy moved to the given store
    pub fn with_state(&self, state: FilterState) -> Self {
        let mut filter = self.clone();
        filter.state = state;
        filter
    }

    /// Copy moved to the global store
    pub fn pin(&self) -> Self {
        self.with_state(FilterState::Global)
    }

    /// Copy with a display alias
    pub fn with_alias(&self, alias: impl Into<String>) -> Self {
        let mut filter = self.clone();
        filter.meta.alias = Some(alias.into());
        filter
    }

    /// Phrase filter
    pub fn is_phrase(&self) -> bool {
        self.meta.filter_type == FilterType::Phrase
    }

    /// Phrases filter
    pub fn is_phrases(&self) -> bool {
        self.meta.filter_type == FilterType::Phrases
    }

    /// Range filter
    pub fn is_range(&self) -> bool {
        self.meta.filter_type == FilterType::Range
    }

    /// Exists filter
    pub fn is_exists(&self) -> bool {
        self.meta.filter_type == FilterType::Exists
    }

    /// Legacy missing filter
    pub fn is_missing(&self) -> bool {
        self.meta.filter_type == FilterType::Missing
    }

    /// Field named by a legacy `{"missing": {"field": ..}}` fragment
    pub fn missing_field(&self) -> Option<&str> {
        self.query.pointer("/missing/field").and_then(Value::as_str)
    }

    /// Query string filter
    pub fn is_query_string(&self) -> bool {
        self.meta.filter_type == FilterType::QueryString
    }

    /// Filter whose fragment is `match_all`
    pub fn is_match_all(&self) -> bool {
        self.query.get("match_all").is_some()
    }

    /// Field of a phrase filter
    pub fn phrase_field(&self) -> Option<&str> {
        let object = self.query.get("match_phrase")?.as_object()?;
        object.keys().next().map(String::as_str)
    }

    /// Value of a phrase filter
    pub fn phrase_value(&self) -> Option<&Value> {
        let object = self.query.get("match_phrase")?.as_object()?;
        let value = object.values().next()?;
        // `{ field: { query: v } }` and `{ field: v }` are both valid
        Some(value.get("query").unwrap_or(value))
    }

    /// Values of a phrases filter, in filter order
    pub fn phrases_values(&self) -> Vec<Value> {
        match &self.meta.params {
            Value::Array(values) => values.clone(),
            _ => Vec::new(),
        }
    }

    /// Display value: alias-independent text describing what the filter matches
    pub fn display_value(&self) -> String {
        match self.meta.filter_type {
            FilterType::Phrase => self
                .phrase_value()
                .map(display_scalar)
                .or_else(|| self.meta.value.clone())
                .unwrap_or_default(),
            FilterType::Phrases => display_values(&self.phrases_values()),
            FilterType::Range => serde_json::from_value::<RangeParams>(self.meta.params.clone())
                .map(|p| display_range(&p))
                .unwrap_or_default(),
            FilterType::Exists => "exists".to_string(),
            FilterType::Missing => "missing".to_string(),
            FilterType::QueryString | FilterType::Custom => self
                .meta
                .value
                .clone()
                .unwrap_or_else(|| self.query.to_string()),
        }
    }
}

/// Whether the filter is pinned
pub fn is_filter_pinned(filter: &Filter) -> bool {
    filter.is_pinned()
}

/// Copy of `filter` with `negate` flipped
pub fn toggle_filter_negated(filter: &Filter) -> Filter {
    filter.toggle_negated()
}

/// Copy of `filter` with `disabled` flipped
pub fn toggle_filter_disabled(filter: &Filter) -> Filter {
    filter.toggle_disabled()
}

/// Copy of `filter`, disabled
pub fn disable_filter(filter: &Filter) -> Filter {
    filter.disable()
}

/// Copy of `filter`, enabled
pub fn enable_filter(filter: &Filter) -> Filter {
    filter.enable()
}

/// Copy of `filter`, moved to the global store
pub fn pin_filter(filter: &Filter) -> Filter {
    filter.pin()
}

pub fn is_phrase_filter(filter: &Filter) -> bool {
    filter.is_phrase()
}

pub fn is_phrases_filter(filter: &Filter) -> bool {
    filter.is_phrases()
}

pub fn is_range_filter(filter: &Filter) -> bool {
    filter.is_range()
}

pub fn is_exists_filter(filter: &Filter) -> bool {
    filter.is_exists()
}

pub fn is_missing_filter(filter: &Filter) -> bool {
    filter.is_missing()
}

pub fn is_query_string_filter(filter: &Filter) -> bool {
    filter.is_query_string()
}

pub fn is_match_all_filter(filter: &Filter) -> bool {
    filter.is_match_all()
}

/// Field of a phrase filter
pub fn get_phrase_filter_field(filter: &Filter) -> Option<&str> {
    filter.phrase_field()
}

/// Value of a phrase filter
pub fn get_phrase_filter_value(filter: &Filter) -> Option<&Value> {
    filter.phrase_value()
}

/// Label shown on the filter pill: the alias if set, else the display value
pub fn get_display_value_from_filter(filter: &Filter) -> String {
    filter
        .meta
        .alias
        .clone()
        .unwrap_or_else(|| filter.display_value())
}

// =============================================================================
// Fragment helpers
// =============================================================================

pub(crate) fn phrase_query(field: &str, value: &Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field.to_string(), value.clone());
    json!({ "match_phrase": inner })
}

pub(crate) fn phrases_query(field: &str, values: &[Value]) -> Value {
    let should: Vec<Value> = values.iter().map(|v| phrase_query(field, v)).collect();
    json!({ "bool": { "should": should, "minimum_should_match": 1 } })
}

pub(crate) fn display_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(crate) fn display_values(values: &[Value]) -> String {
    values
        .iter()
        .map(display_scalar)
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_range(params: &RangeParams) -> String {
    let low = params
        .gte
        .as_ref()
        .or(params.gt.as_ref())
        .map(display_scalar)
        .unwrap_or_else(|| "-∞".to_string());
    let high = params
        .lte
        .as_ref()
        .or(params.lt.as_ref())
        .map(display_scalar)
        .unwrap_or_else(|| "+∞".to_string());
    format!("{} to {}", low, high)
}

fn require_field_name(filter_type: &'static str, field: &Field) -> Result<()> {
    if field.name.trim().is_empty() {
        return Err(QueryError::invalid_filter(filter_type, "field name is empty"));
    }
    Ok(())
}

fn require_scalar(filter_type: &'static str, value: &Value) -> Result<()> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        Value::Null => Err(QueryError::invalid_filter(filter_type, "value is missing")),
        other => Err(QueryError::invalid_filter(
            filter_type,
            format!("value must be a scalar, got {}", other),
        )),
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}
