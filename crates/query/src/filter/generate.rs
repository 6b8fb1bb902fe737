//! Filter generation and normalization
//!
//! `generate_filters` turns a click on a field/value pair into an updated
//! filter list. `map_and_flatten_filters` brings filters from any source into
//! one shape per logical predicate before they reach the query builder.

use serde_json::{Map, Value, json};

use super::{
    Filter, FilterType, build_exists_filter, build_phrase_filter, build_phrases_filter,
    display_scalar, display_values, phrases_query,
};
use crate::error::Result;
use crate::field::{Field, IndexPattern};

/// Click operation on a field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperation {
    /// Include the value (`+`)
    Add,
    /// Exclude the value (`-`)
    Remove,
}

impl FilterOperation {
    /// Parse `+` / `-` (or `add` / `remove`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "+" | "add" | "is" => Some(Self::Add),
            "-" | "remove" | "is_not" => Some(Self::Remove),
            _ => None,
        }
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Apply a field/value click to an existing filter list
///
/// Returns the full resulting list. Values are deduplicated by value, and
/// applying the same click twice yields the same list as applying it once.
/// A `null` value means "field is missing" and maps to an exists filter.
pub fn generate_filters(
    existing: &[Filter],
    field: &Field,
    values: &[Value],
    operation: FilterOperation,
    index: &IndexPattern,
) -> Result<Vec<Filter>> {
    let mut filters: Vec<Filter> = existing.to_vec();
    let mut seen: Vec<&Value> = Vec::new();

    for value in values {
        if seen.iter().any(|v| same_value(v, value)) {
            continue;
        }
        seen.push(value);

        if value.is_null() {
            apply_missing(&mut filters, field, operation, index)?;
        } else {
            match operation {
                FilterOperation::Add => apply_add(&mut filters, field, value, index)?,
                FilterOperation::Remove => apply_remove(&mut filters, field, value, index)?,
            }
        }
    }

    Ok(filters)
}

fn apply_missing(
    filters: &mut Vec<Filter>,
    field: &Field,
    operation: FilterOperation,
    index: &IndexPattern,
) -> Result<()> {
    // "+ missing" is a negated exists filter
    let negate = operation == FilterOperation::Add;
    let position = filters
        .iter()
        .position(|f| f.is_exists() && f.meta.key.as_deref() == Some(field.name.as_str()));

    match position {
        Some(i) => filters[i] = filters[i].with_negate(negate).enable(),
        None => filters.push(build_exists_filter(field, index)?.with_negate(negate)),
    }
    Ok(())
}

fn apply_add(
    filters: &mut Vec<Filter>,
    field: &Field,
    value: &Value,
    index: &IndexPattern,
) -> Result<()> {
    if let Some(i) = find_phrase(filters, field, value) {
        filters[i] = filters[i].with_negate(false).enable();
        return Ok(());
    }

    if let Some(i) = find_active_phrases(filters, field) {
        let mut values = filters[i].phrases_values();
        if !values.iter().any(|v| same_value(v, value)) {
            values.push(value.clone());
            filters[i] = rebuild_phrases(&filters[i], field, &values, index)?;
        }
        return Ok(());
    }

    let other_phrase = filters.iter().position(|f| {
        f.is_phrase() && f.is_enabled() && !f.meta.negate && f.phrase_field() == Some(&field.name)
    });
    if let Some(i) = other_phrase {
        let existing_value = filters[i].phrase_value().cloned().unwrap_or(Value::Null);
        filters[i] = rebuild_phrases(&filters[i], field, &[existing_value, value.clone()], index)?;
        return Ok(());
    }

    filters.push(build_phrase_filter(field, value.clone(), index)?);
    Ok(())
}

fn apply_remove(
    filters: &mut Vec<Filter>,
    field: &Field,
    value: &Value,
    index: &IndexPattern,
) -> Result<()> {
    if let Some(i) = find_phrase(filters, field, value) {
        filters[i] = filters[i].with_negate(true).enable();
        return Ok(());
    }

    if let Some(i) = find_active_phrases(filters, field) {
        let values: Vec<Value> = filters[i]
            .phrases_values()
            .into_iter()
            .filter(|v| !same_value(v, value))
            .collect();
        match values.as_slice() {
            [] => {
                filters.remove(i);
            }
            [single] => {
                let template = &filters[i];
                let mut phrase = build_phrase_filter(field, single.clone(), index)?;
                phrase.meta.alias = template.meta.alias.clone();
                phrase.state = template.state;
                filters[i] = phrase;
            }
            rest => filters[i] = rebuild_phrases(&filters[i], field, rest, index)?,
        }
    }

    filters.push(build_phrase_filter(field, value.clone(), index)?.with_negate(true));
    Ok(())
}

fn find_phrase(filters: &[Filter], field: &Field, value: &Value) -> Option<usize> {
    filters.iter().position(|f| {
        f.is_phrase()
            && f.phrase_field() == Some(&field.name)
            && f.phrase_value().is_some_and(|v| same_value(v, value))
    })
}

fn find_active_phrases(filters: &[Filter], field: &Field) -> Option<usize> {
    filters.iter().position(|f| {
        f.is_phrases()
            && f.is_enabled()
            && !f.meta.negate
            && f.meta.key.as_deref() == Some(field.name.as_str())
    })
}

fn rebuild_phrases(
    template: &Filter,
    field: &Field,
    values: &[Value],
    index: &IndexPattern,
) -> Result<Filter> {
    let mut filter = build_phrases_filter(field, values, index)?;
    filter.meta.alias = template.meta.alias.clone();
    filter.state = template.state;
    Ok(filter)
}

/// Clicked values arrive as strings from some widgets and as typed JSON from
/// others; `"500"` and `500` name the same bucket.
fn same_value(a: &Value, b: &Value) -> bool {
    a == b || (!a.is_null() && !b.is_null() && display_scalar(a) == display_scalar(b))
}

// =============================================================================
// Normalization
// =============================================================================

/// Flatten nested filter groups and normalize every filter's shape and meta
///
/// Duplicates are kept; dropping them is the query builder's job.
pub fn map_and_flatten_filters<I, G>(groups: I) -> Vec<Filter>
where
    I: IntoIterator<Item = G>,
    G: IntoIterator<Item = Filter>,
{
    groups.into_iter().flatten().map(map_filter).collect()
}

/// Detect the filter type from its query fragment and fill in `meta`
pub fn map_filter(filter: Filter) -> Filter {
    let mut filter = migrate_filter(filter);
    let query = filter.query.clone();

    if let Some((field, value)) = single_entry(query.get("match_phrase")) {
        let value = value.get("query").unwrap_or(value).clone();
        filter.meta.filter_type = FilterType::Phrase;
        filter.meta.key = Some(field.clone());
        filter.meta.value = Some(display_scalar(&value));
        filter.meta.params = json!({ "query": value });
    } else if let Some((field, values)) = phrases_shape(&query) {
        filter.query = phrases_query(&field, &values);
        filter.meta.filter_type = FilterType::Phrases;
        filter.meta.key = Some(field);
        filter.meta.value = Some(display_values(&values));
        filter.meta.params = Value::Array(values);
    } else if let Some((field, bounds)) = single_entry(query.get("range")) {
        filter.meta.filter_type = FilterType::Range;
        filter.meta.key = Some(field.clone());
        filter.meta.params = bounds.clone();
        filter.meta.value = Some(filter.display_value());
    } else if let Some(field) = query.pointer("/exists/field").and_then(Value::as_str) {
        filter.meta.filter_type = FilterType::Exists;
        filter.meta.key = Some(field.to_string());
        filter.meta.value = Some("exists".to_string());
    } else if let Some(field) = query.pointer("/missing/field").and_then(Value::as_str) {
        filter.meta.filter_type = FilterType::Missing;
        filter.meta.key = Some(field.to_string());
        filter.meta.value = Some("missing".to_string());
    } else if let Some(text) = query.pointer("/query_string/query").and_then(Value::as_str) {
        filter.meta.filter_type = FilterType::QueryString;
        filter.meta.key = None;
        filter.meta.value = Some(text.to_string());
    } else {
        filter.meta.filter_type = FilterType::Custom;
        filter.meta.key = None;
    }

    filter
}

/// Rewrite legacy fragments into their current form
///
/// `{"query": {"match": {f: {query: v, type: "phrase"}}}}` and
/// `{"match": {f: {query: v, type: "phrase"}}}` both become
/// `{"match_phrase": {f: v}}`.
pub fn migrate_filter(mut filter: Filter) -> Filter {
    if let Some(inner) = filter.query.get("query")
        && inner.get("match").is_some()
    {
        filter.query = inner.clone();
    }

    let migrated = single_entry(filter.query.get("match")).and_then(|(field, params)| {
        let is_phrase = params.get("type").and_then(Value::as_str) == Some("phrase");
        let value = params.get("query")?;
        is_phrase.then(|| {
            let mut inner = Map::new();
            inner.insert(field.clone(), value.clone());
            json!({ "match_phrase": inner })
        })
    });
    if let Some(query) = migrated {
        filter.query = query;
    }
    filter
}

fn single_entry(value: Option<&Value>) -> Option<(&String, &Value)> {
    let object = value?.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.iter().next()
}

/// `bool.should` of `match_phrase` on one field, or `terms` on one field
fn phrases_shape(query: &Value) -> Option<(String, Vec<Value>)> {
    if let Some((field, values)) = single_entry(query.get("terms")) {
        let values = values.as_array()?.clone();
        return Some((field.clone(), values));
    }

    let should = query.pointer("/bool/should")?.as_array()?;
    if should.is_empty() {
        return None;
    }
    let mut field_name: Option<String> = None;
    let mut values = Vec::with_capacity(should.len());
    for clause in should {
        let (field, value) = single_entry(clause.get("match_phrase"))?;
        match &field_name {
            Some(existing) if existing != field => return None,
            Some(_) => {}
            None => field_name = Some(field.clone()),
        }
        values.push(value.get("query").unwrap_or(value).clone());
    }
    field_name.map(|f| (f, values))
}
