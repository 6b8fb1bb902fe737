//! Lowering KQL syntax trees to the structured query DSL

use serde_json::{Map, Value, json};

use super::ast::{FunctionName, KueryNode, Literal, LiteralValue, RangeNode, Wildcard};
use crate::builder::OpenSearchQueryConfig;
use crate::error::{QueryError, Result};
use crate::field::{Field, FieldKind, IndexPattern};

/// Lower a KQL syntax tree to a DSL clause
///
/// Field names are resolved against `index` when one is given. Without an
/// index pattern every field name is taken as written.
pub fn to_structured_query(
    node: &KueryNode,
    index: Option<&IndexPattern>,
    config: &OpenSearchQueryConfig,
) -> Result<Value> {
    Lowering { index, config }.lower(node)
}

struct Lowering<'a> {
    index: Option<&'a IndexPattern>,
    config: &'a OpenSearchQueryConfig,
}

/// How a field reference resolved
enum Resolved<'a> {
    /// Known fields (one, or several for a wildcard name)
    Fields(Vec<Field>),
    /// No index pattern given; use the name as written
    Unchecked(&'a str),
    /// Not in the index pattern; degrade to a text search
    Unknown(String),
}

impl<'a> Lowering<'a> {
    fn lower(&self, node: &KueryNode) -> Result<Value> {
        match node {
            KueryNode::Function { name, arguments } => self.lower_function(*name, arguments),
            KueryNode::Range(range) => self.lower_range(range),
            // Bare literals only appear as function arguments
            KueryNode::Literal(literal) => Ok(free_text(literal)),
            KueryNode::Wildcard(wildcard) => Ok(free_text_wildcard(wildcard)),
        }
    }

    fn lower_function(&self, name: FunctionName, arguments: &[KueryNode]) -> Result<Value> {
        match name {
            FunctionName::And => {
                if arguments.is_empty() {
                    return Ok(match_all());
                }
                let must = self.lower_all(arguments)?;
                Ok(json!({ "bool": { "must": must } }))
            }
            FunctionName::Or => {
                let should = self.lower_all(arguments)?;
                Ok(json!({ "bool": { "should": should, "minimum_should_match": 1 } }))
            }
            FunctionName::Not => {
                let must_not = self.lower_all(arguments)?;
                Ok(json!({ "bool": { "must_not": must_not } }))
            }
            FunctionName::Exists => match arguments {
                [field] => self.lower_exists(field),
                _ => Err(QueryError::syntax(0, "exists takes exactly one field")),
            },
            FunctionName::Is => match arguments {
                [field, value] => self.lower_is(field, value),
                _ => Err(QueryError::syntax(0, "is takes a field and a value")),
            },
        }
    }

    fn lower_all(&self, nodes: &[KueryNode]) -> Result<Vec<Value>> {
        nodes.iter().map(|n| self.lower(n)).collect()
    }

    fn lower_is(&self, field: &KueryNode, value: &KueryNode) -> Result<Value> {
        if let KueryNode::Literal(literal) = field
            && literal.is_null()
        {
            return Ok(free_text_value(value));
        }

        match self.resolve(field)? {
            Resolved::Fields(fields) => {
                let clauses: Vec<Value> = fields
                    .iter()
                    .map(|f| self.field_match(&f.name, f.kind, value))
                    .collect();
                Ok(any_of(clauses))
            }
            Resolved::Unchecked(name) => Ok(self.field_match(name, FieldKind::Unknown, value)),
            Resolved::Unknown(_) if self.index.is_none() => Ok(free_text_value(value)),
            Resolved::Unknown(name) => {
                let text_fields = self.index.map(|i| i.text_field_names()).unwrap_or_default();
                tracing::warn!(
                    field = %name,
                    fallback_fields = text_fields.len(),
                    "unknown field, falling back to multi-field match"
                );
                Ok(multi_field_fallback(value, text_fields))
            }
        }
    }

    fn lower_exists(&self, field: &KueryNode) -> Result<Value> {
        match self.resolve(field)? {
            Resolved::Fields(fields) => Ok(any_of(
                fields.iter().map(|f| exists(&f.name)).collect(),
            )),
            Resolved::Unchecked(name) => Ok(exists(name)),
            Resolved::Unknown(name) => {
                tracing::warn!(field = %name, "exists on a field missing from the index pattern");
                Ok(exists(&name))
            }
        }
    }

    fn lower_range(&self, range: &RangeNode) -> Result<Value> {
        let field = KueryNode::Literal(Literal::string(range.field.clone()));
        let (name, kind) = match self.resolve(&field)? {
            Resolved::Fields(fields) => match fields.first() {
                Some(f) => (f.name.clone(), f.kind),
                None => (range.field.clone(), FieldKind::Unknown),
            },
            Resolved::Unchecked(name) => (name.to_string(), FieldKind::Unknown),
            Resolved::Unknown(name) => {
                tracing::warn!(field = %name, "range on a field missing from the index pattern");
                (name, FieldKind::Unknown)
            }
        };

        let mut bounds = Map::new();
        bounds.insert(range.operator.as_str().to_string(), range.value.to_json());
        if kind == FieldKind::Date
            && let Some(tz) = &self.config.date_format_tz
        {
            bounds.insert("time_zone".to_string(), json!(tz));
        }
        Ok(json!({ "range": { name: bounds } }))
    }

    /// Clause matching `value` on one concrete field
    fn field_match(&self, name: &str, kind: FieldKind, value: &KueryNode) -> Value {
        match value {
            KueryNode::Wildcard(wildcard) if wildcard.is_match_all() => exists(name),
            KueryNode::Wildcard(wildcard) => json!({
                "query_string": {
                    "fields": [name],
                    "query": wildcard.to_query_string(),
                }
            }),
            KueryNode::Literal(literal) if kind == FieldKind::Date => {
                let mut bounds = Map::new();
                bounds.insert("gte".to_string(), literal.to_json());
                bounds.insert("lte".to_string(), literal.to_json());
                if let Some(tz) = &self.config.date_format_tz {
                    bounds.insert("time_zone".to_string(), json!(tz));
                }
                json!({ "range": { name: bounds } })
            }
            KueryNode::Literal(literal) => {
                let key = if literal.quoted { "match_phrase" } else { "match" };
                json!({ key: { name: literal.to_json() } })
            }
            // Parser never nests other nodes under `is`
            _ => match_all(),
        }
    }

    fn resolve<'n>(&self, field: &'n KueryNode) -> Result<Resolved<'n>> {
        let (name, matched): (String, Vec<Field>) = match (field, self.index) {
            (KueryNode::Literal(literal), None) => {
                return Ok(Resolved::Unchecked(literal_name(literal)));
            }
            (KueryNode::Wildcard(wildcard), None) => {
                // Nothing to expand against
                return Ok(Resolved::Unknown(wildcard.to_pattern()));
            }
            (KueryNode::Literal(literal), Some(index)) => {
                let name = literal_name(literal);
                (name.to_string(), index.field(name).cloned().into_iter().collect())
            }
            (KueryNode::Wildcard(wildcard), Some(index)) => (
                wildcard.to_pattern(),
                index
                    .fields_matching(&wildcard.to_pattern())
                    .into_iter()
                    .cloned()
                    .collect(),
            ),
            _ => return Err(QueryError::syntax(0, "field must be a name or wildcard")),
        };

        if !matched.is_empty() {
            return Ok(Resolved::Fields(matched));
        }
        if self.config.strict_field_resolution {
            return Err(QueryError::FieldResolution {
                field: name,
                index: self.index.map(|i| i.title.clone()).unwrap_or_default(),
            });
        }
        Ok(Resolved::Unknown(name))
    }
}

fn literal_name(literal: &Literal) -> &str {
    match &literal.value {
        LiteralValue::String(s) => s.as_str(),
        _ => "",
    }
}

fn match_all() -> Value {
    json!({ "match_all": {} })
}

fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

fn any_of(mut clauses: Vec<Value>) -> Value {
    if clauses.len() == 1 {
        return clauses.remove(0);
    }
    json!({ "bool": { "should": clauses, "minimum_should_match": 1 } })
}

fn free_text(literal: &Literal) -> Value {
    let kind = if literal.quoted { "phrase" } else { "best_fields" };
    json!({
        "multi_match": {
            "query": literal.to_json(),
            "type": kind,
            "lenient": true,
        }
    })
}

fn free_text_value(value: &KueryNode) -> Value {
    match value {
        KueryNode::Wildcard(wildcard) => free_text_wildcard(wildcard),
        KueryNode::Literal(literal) => free_text(literal),
        _ => match_all(),
    }
}

fn free_text_wildcard(wildcard: &Wildcard) -> Value {
    if wildcard.is_match_all() {
        return match_all();
    }
    json!({ "query_string": { "query": wildcard.to_query_string() } })
}

fn multi_field_fallback(value: &KueryNode, fields: Vec<String>) -> Value {
    if fields.is_empty() {
        return json!({ "match_none": {} });
    }
    match value {
        KueryNode::Wildcard(wildcard) if wildcard.is_match_all() => any_of(
            fields.iter().map(|f| exists(f)).collect(),
        ),
        KueryNode::Wildcard(wildcard) => json!({
            "query_string": {
                "fields": fields,
                "query": wildcard.to_query_string(),
            }
        }),
        KueryNode::Literal(literal) => {
            let kind = if literal.quoted { "phrase" } else { "best_fields" };
            json!({
                "multi_match": {
                    "query": literal.to_json(),
                    "fields": fields,
                    "type": kind,
                    "lenient": true,
                }
            })
        }
        _ => match_all(),
    }
}
