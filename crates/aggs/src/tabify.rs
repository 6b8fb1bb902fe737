//! Flatten a nested aggregation response into a table
//!
//! The walk is depth-first over the bucket configs in list order. Every
//! leaf bucket path becomes one row. Rows keep the response's bucket order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{AggConfig, AggConfigs, check_filters};
use crate::error::{AggError, Result};
use crate::types::{BucketType, MetricType};

/// Options for [`tabify_agg_response`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabifyOptions {
    /// Emit metric columns under every bucket level
    #[serde(default)]
    pub metrics_at_all_levels: bool,
    /// Keep rows with missing metric values, using `null` cells
    #[serde(default)]
    pub partial_rows: bool,
}

impl TabifyOptions {
    pub fn with_metrics_at_all_levels(mut self, enabled: bool) -> Self {
        self.metrics_at_all_levels = enabled;
        self
    }

    pub fn with_partial_rows(mut self, enabled: bool) -> Self {
        self.partial_rows = enabled;
        self
    }
}

/// A table column produced by one aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabbedAggColumn {
    /// `col-{position}-{agg id}`
    pub id: String,
    pub name: String,
    pub agg_id: String,
}

/// Column id to cell value
pub type TabbedAggRow = BTreeMap<String, Value>;

/// Flattened aggregation response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabbedTable {
    pub columns: Vec<TabbedAggColumn>,
    pub rows: Vec<TabbedAggRow>,
}

impl TabbedTable {
    pub fn new(columns: Vec<TabbedAggColumn>, rows: Vec<TabbedAggRow>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, id: &str) -> Option<&TabbedAggColumn> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Values of one column, top to bottom (`null` where absent)
    pub fn values(&self, column_id: &str) -> Vec<&Value> {
        self.rows
            .iter()
            .map(|row| row.get(column_id).unwrap_or(&Value::Null))
            .collect()
    }

    /// Rows as arrays in column order
    pub fn to_arrays(&self) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(&c.id).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Where a column reads its value from
#[derive(Debug, Clone, Copy)]
enum Slot {
    /// Key of the bucket at this depth
    Bucket(usize),
    /// Metric read at this bucket depth (`None` is the response root)
    Metric(Option<usize>),
}

struct Layout<'a> {
    columns: Vec<TabbedAggColumn>,
    slots: Vec<(Slot, &'a AggConfig)>,
}

fn layout(aggs: &AggConfigs, minimal: bool) -> Layout<'_> {
    let buckets = aggs.buckets();
    let metrics = aggs.metrics();

    let mut slots: Vec<(Slot, &AggConfig)> = Vec::new();
    if buckets.is_empty() {
        slots.extend(metrics.iter().map(|m| (Slot::Metric(None), *m)));
    } else if minimal {
        slots.extend(buckets.iter().enumerate().map(|(d, b)| (Slot::Bucket(d), *b)));
        let innermost = buckets.len() - 1;
        slots.extend(metrics.iter().map(|m| (Slot::Metric(Some(innermost)), *m)));
    } else {
        let innermost = buckets.len() - 1;
        for (depth, bucket) in buckets.iter().enumerate() {
            slots.push((Slot::Bucket(depth), *bucket));
            for metric in &metrics {
                let parent = metric.metric_type().is_some_and(|m| m.is_parent_pipeline());
                if depth == innermost || !parent {
                    slots.push((Slot::Metric(Some(depth)), *metric));
                }
            }
        }
    }

    let columns = slots
        .iter()
        .enumerate()
        .map(|(i, (_, agg))| TabbedAggColumn {
            id: format!("col-{}-{}", i, agg.id),
            name: aggs.label(agg),
            agg_id: agg.id.clone(),
        })
        .collect();
    Layout { columns, slots }
}

/// Columns the table for `aggs` will have
///
/// `minimal` lists each metric once after the buckets. Otherwise metrics
/// repeat after every bucket column.
pub fn tabify_get_columns(aggs: &AggConfigs, minimal: bool) -> Vec<TabbedAggColumn> {
    layout(aggs, minimal).columns
}

// =============================================================================
// Rows
// =============================================================================

/// Flatten `response` into rows and columns
///
/// `response` is either the full search response or its `aggregations`
/// object. Zero buckets at a level produce no rows for that branch. With no
/// bucket configs there is exactly one row.
pub fn tabify_agg_response(
    aggs: &AggConfigs,
    response: &Value,
    options: TabifyOptions,
) -> Result<TabbedTable> {
    let root = response
        .as_object()
        .ok_or_else(|| AggError::shape("$", "response is not an object"))?;
    let aggregations = match root.get("aggregations") {
        Some(Value::Object(aggregations)) => aggregations,
        Some(_) => return Err(AggError::shape("aggregations", "expected an object")),
        None => root,
    };

    let layout = layout(aggs, !options.metrics_at_all_levels);
    let mut walker = Walker {
        buckets: aggs.buckets(),
        slots: &layout.slots,
        columns: &layout.columns,
        options,
        total_hits: total_hits(root),
        rows: Vec::new(),
    };

    let mut scopes = vec![aggregations];
    let mut cells = vec![Value::Null; layout.columns.len()];
    if walker.buckets.is_empty() {
        walker.fill_root(aggregations, &mut cells);
        walker.push_row(&cells);
    } else {
        walker.walk(0, "aggregations".to_string(), &mut scopes, &mut cells)?;
    }

    tracing::debug!(
        columns = layout.columns.len(),
        rows = walker.rows.len(),
        "tabified aggregation response"
    );
    let rows = walker.rows;
    Ok(TabbedTable::new(layout.columns, rows))
}

struct Walker<'a> {
    buckets: Vec<&'a AggConfig>,
    slots: &'a [(Slot, &'a AggConfig)],
    columns: &'a [TabbedAggColumn],
    options: TabifyOptions,
    total_hits: Option<Value>,
    rows: Vec<TabbedAggRow>,
}

impl<'a> Walker<'a> {
    /// Visit every bucket of the config at `depth` inside `scopes.last()`
    fn walk<'r>(
        &mut self,
        depth: usize,
        path: String,
        scopes: &mut Vec<&'r Map<String, Value>>,
        cells: &mut [Value],
    ) -> Result<()> {
        let config = self.buckets[depth];
        let Some(scope) = scopes.last().copied() else {
            return Ok(());
        };
        let path = format!("{}.{}", path, config.id);
        let agg = scope
            .get(&config.id)
            .ok_or_else(|| AggError::shape(&path, "missing aggregation"))?;

        let buckets = bucket_list(config, agg, &path)?;
        for (i, (key, bucket)) in buckets.into_iter().enumerate() {
            let bucket_path = format!("{}.buckets[{}]", path, i);
            let bucket = bucket
                .as_object()
                .ok_or_else(|| AggError::shape(&bucket_path, "bucket is not an object"))?;
            let key = match key {
                Some(key) => key,
                None => bucket
                    .get("key")
                    .cloned()
                    .ok_or_else(|| AggError::shape(&bucket_path, "bucket has no key"))?,
            };

            self.set_bucket(depth, key, cells);
            scopes.push(bucket);
            let complete = self.fill_metrics(depth, scopes, cells);
            if complete || self.options.partial_rows {
                if depth + 1 == self.buckets.len() {
                    self.push_row(cells);
                } else {
                    self.walk(depth + 1, bucket_path, scopes, cells)?;
                }
            }
            scopes.pop();
        }
        Ok(())
    }

    fn set_bucket(&self, depth: usize, key: Value, cells: &mut [Value]) {
        for (i, (slot, _)) in self.slots.iter().enumerate() {
            if let Slot::Bucket(d) = slot
                && *d == depth
            {
                cells[i] = key;
                return;
            }
        }
    }

    /// Fill metric cells read at `depth`; false when any value is missing
    fn fill_metrics(&self, depth: usize, scopes: &[&Map<String, Value>], cells: &mut [Value]) -> bool {
        let mut complete = true;
        for (i, (slot, metric)) in self.slots.iter().enumerate() {
            if let Slot::Metric(Some(d)) = slot
                && *d == depth
            {
                match metric_value(metric, scopes, None) {
                    Some(value) => cells[i] = value,
                    None => {
                        cells[i] = Value::Null;
                        complete = false;
                    }
                }
            }
        }
        complete
    }

    /// Metrics without buckets read from the root; missing values stay null
    fn fill_root(&self, aggregations: &Map<String, Value>, cells: &mut [Value]) {
        for (i, (slot, metric)) in self.slots.iter().enumerate() {
            if let Slot::Metric(None) = slot {
                cells[i] = metric_value(metric, &[aggregations], self.total_hits.as_ref())
                    .unwrap_or(Value::Null);
            }
        }
    }

    fn push_row(&mut self, cells: &[Value]) {
        let row = self
            .columns
            .iter()
            .zip(cells)
            .map(|(column, value)| (column.id.clone(), value.clone()))
            .collect();
        self.rows.push(row);
    }
}

/// Buckets of one bucket aggregation with their keys
///
/// Keyed objects use the object key. Filters buckets follow the order of
/// the configured filters.
fn bucket_list<'r>(
    config: &AggConfig,
    agg: &'r Value,
    path: &str,
) -> Result<Vec<(Option<Value>, &'r Value)>> {
    match agg.get("buckets") {
        Some(Value::Array(buckets)) => Ok(buckets.iter().map(|b| (None, b)).collect()),
        Some(Value::Object(keyed)) => {
            let mut out: Vec<(Option<Value>, &Value)> = Vec::with_capacity(keyed.len());
            if config.bucket_type() == Some(BucketType::Filters) {
                for (label, _) in check_filters(config)? {
                    if let Some(bucket) = keyed.get(&label) {
                        out.push((Some(Value::String(label)), bucket));
                    }
                }
            }
            for (key, bucket) in keyed {
                let seen = out
                    .iter()
                    .any(|(k, _)| k.as_ref().and_then(Value::as_str) == Some(key.as_str()));
                if !seen {
                    out.push((Some(Value::String(key.clone())), bucket));
                }
            }
            Ok(out)
        }
        Some(_) => Err(AggError::shape(path, "buckets is neither an array nor an object")),
        None => Err(AggError::shape(path, "aggregation has no buckets")),
    }
}

/// Read a metric from the innermost scope (siblings search outward)
fn metric_value(metric: &AggConfig, scopes: &[&Map<String, Value>], total_hits: Option<&Value>) -> Option<Value> {
    let metric_type = metric.metric_type()?;
    let scope = scopes.last()?;

    if metric_type.is_sibling_pipeline() {
        return scopes
            .iter()
            .rev()
            .find_map(|s| s.get(&metric.id))
            .and_then(|v| v.get("value"))
            .cloned();
    }

    match metric_type {
        MetricType::Count => scope
            .get("doc_count")
            .or(total_hits)
            .cloned(),
        MetricType::Median => {
            let values = scope.get(&metric.id)?.get("values")?;
            values.get("50.0").or_else(|| values.get("50")).cloned()
        }
        MetricType::Percentiles => scope.get(&metric.id)?.get("values").cloned(),
        _ => scope.get(&metric.id)?.get("value").cloned(),
    }
}

/// `hits.total` as a number (both `{"value": n}` and bare `n` forms)
fn total_hits(root: &Map<String, Value>) -> Option<Value> {
    let total = root.get("hits")?.get("total")?;
    match total {
        Value::Object(total) => total.get("value").cloned(),
        Value::Number(_) => Some(total.clone()),
        _ => None,
    }
}
