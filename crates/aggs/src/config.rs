//! Aggregation configs
//!
//! An [`AggConfigs`] is an ordered list of validated [`AggConfig`]s. Bucket
//! configs nest in list order, outermost first. Metrics are evaluated in
//! the innermost bucket. The same list drives both request generation
//! ([`AggConfigs::to_dsl`]) and response flattening
//! ([`crate::tabify_agg_response`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use quarry_config::AggsConfig;
use quarry_query::{
    AbsoluteTimeRange, IndexPattern, OpenSearchQueryConfig, Query, build_opensearch_query,
};

use crate::cidr::CidrMask;
use crate::error::{AggError, Result};
use crate::interval::{AUTO, date_histogram_interval, parse_interval, resolve_interval};
use crate::types::{AggType, BucketType, MetricType, ParamKind, ParamSpec, Schema};

/// Reference to the document count of a bucket
pub const COUNT_REF: &str = "_count";

/// Reference to the key of a bucket (terms ordering only)
pub const KEY_REF: &str = "_key";

const MOVING_AVG_SCRIPT: &str = "MovingFunctions.unweightedAvg(values)";

/// A single aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggConfig {
    /// Unique id; empty means "assign one on add"
    #[serde(default)]
    pub id: String,

    #[serde(rename = "type")]
    pub agg_type: AggType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default)]
    pub params: Map<String, Value>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AggConfig {
    /// Create a config with no id, field or params
    pub fn new(agg_type: AggType) -> Self {
        Self {
            id: String::new(),
            agg_type,
            field: None,
            params: Map::new(),
            enabled: true,
        }
    }

    pub fn bucket(bucket: BucketType) -> Self {
        Self::new(AggType::Bucket(bucket))
    }

    pub fn metric(metric: MetricType) -> Self {
        Self::new(AggType::Metric(metric))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn schema(&self) -> Schema {
        self.agg_type.schema()
    }

    pub fn is_bucket(&self) -> bool {
        self.schema() == Schema::Bucket
    }

    /// Metric type, if this is a metric
    pub fn metric_type(&self) -> Option<MetricType> {
        match self.agg_type {
            AggType::Metric(m) => Some(m),
            AggType::Bucket(_) => None,
        }
    }

    /// Bucket type, if this is a bucket
    pub fn bucket_type(&self) -> Option<BucketType> {
        match self.agg_type {
            AggType::Bucket(b) => Some(b),
            AggType::Metric(_) => None,
        }
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }

    fn int_param(&self, name: &str) -> Option<i64> {
        self.params.get(name).and_then(Value::as_i64)
    }

    fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or_default()
    }

    fn invalid(&self, param: &str, reason: impl Into<String>) -> AggError {
        AggError::invalid_param(&self.id, param, reason)
    }
}

/// Settings for generating the aggregation request
#[derive(Debug, Clone)]
pub struct DslContext<'a> {
    /// Index pattern used to lower `filters` bucket queries
    pub index: Option<&'a IndexPattern>,
    /// Resolved time range; required for `auto` intervals
    pub time_range: Option<AbsoluteTimeRange>,
    pub query_config: OpenSearchQueryConfig,
    pub bar_target: u32,
    pub max_buckets: u32,
    /// Emit metrics under every bucket level, not only the innermost
    pub metrics_at_all_levels: bool,
}

impl Default for DslContext<'_> {
    fn default() -> Self {
        Self::new(&AggsConfig::default())
    }
}

impl<'a> DslContext<'a> {
    pub fn new(config: &AggsConfig) -> Self {
        Self {
            index: None,
            time_range: None,
            query_config: OpenSearchQueryConfig::default(),
            bar_target: config.bar_target,
            max_buckets: config.max_buckets,
            metrics_at_all_levels: config.metrics_at_all_levels,
        }
    }

    pub fn with_index(mut self, index: &'a IndexPattern) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_time_range(mut self, range: AbsoluteTimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn with_query_config(mut self, config: OpenSearchQueryConfig) -> Self {
        self.query_config = config;
        self
    }

    pub fn with_metrics_at_all_levels(mut self, enabled: bool) -> Self {
        self.metrics_at_all_levels = enabled;
        self
    }
}

/// Ordered, validated aggregation configs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggConfigs {
    configs: Vec<AggConfig>,
}

impl AggConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add every config in order
    pub fn from_configs(
        configs: impl IntoIterator<Item = AggConfig>,
        index: Option<&IndexPattern>,
    ) -> Result<Self> {
        let mut aggs = Self::new();
        for config in configs {
            aggs.add(config, index)?;
        }
        Ok(aggs)
    }

    /// Validate, complete and append a config
    ///
    /// Missing ids are assigned (`"1"`, `"2"`, ...). Optional params get their
    /// defaults. When `index` is given, the field must exist there with a
    /// kind the aggregation accepts. References to other aggregations must
    /// point to configs already in the list.
    pub fn add(&mut self, mut config: AggConfig, index: Option<&IndexPattern>) -> Result<&AggConfig> {
        if config.id.trim().is_empty() {
            config.id = self.next_id();
        }
        if config.id == COUNT_REF || config.id == KEY_REF {
            return Err(config.invalid("id", "reserved id"));
        }
        if self.get(&config.id).is_some() {
            return Err(AggError::DuplicateAggId(config.id));
        }

        check_field(&config, index)?;
        fill_params(&mut config)?;
        self.check_params(&config)?;

        tracing::debug!(
            id = %config.id,
            agg_type = %config.agg_type,
            field = config.field.as_deref().unwrap_or("-"),
            "added aggregation"
        );
        self.configs.push(config);
        Ok(&self.configs[self.configs.len() - 1])
    }

    fn next_id(&self) -> String {
        (1..=self.configs.len() + 1)
            .map(|n| n.to_string())
            .find(|id| self.get(id).is_none())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<&AggConfig> {
        self.configs.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggConfig> {
        self.configs.iter()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Enabled bucket configs, outermost first
    pub fn buckets(&self) -> Vec<&AggConfig> {
        self.configs
            .iter()
            .filter(|c| c.enabled && c.is_bucket())
            .collect()
    }

    /// Enabled metric configs in list order
    pub fn metrics(&self) -> Vec<&AggConfig> {
        self.configs
            .iter()
            .filter(|c| c.enabled && !c.is_bucket())
            .collect()
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn check_params(&self, config: &AggConfig) -> Result<()> {
        match config.agg_type {
            AggType::Bucket(BucketType::DateHistogram) => {
                let interval = config.str_param("interval").unwrap_or(AUTO);
                if interval.trim() != AUTO {
                    parse_interval(interval)?;
                }
                check_min_doc_count(config)
            }
            AggType::Bucket(BucketType::Histogram) => {
                let interval = config.param("interval").and_then(Value::as_f64);
                if !interval.is_some_and(|i| i > 0.0) {
                    return Err(config.invalid("interval", "must be a positive number"));
                }
                check_min_doc_count(config)
            }
            AggType::Bucket(BucketType::Terms) => self.check_terms(config),
            AggType::Bucket(BucketType::Range | BucketType::DateRange) => check_ranges(config),
            AggType::Bucket(BucketType::IpRange) => check_ip_ranges(config),
            AggType::Bucket(BucketType::Filters) => check_filters(config).map(|_| ()),
            AggType::Metric(MetricType::Percentiles) => check_percents(config),
            AggType::Metric(m) if m.is_parent_pipeline() => {
                self.check_metric_ref(config, "metric_agg")?;
                for param in ["window", "lag"] {
                    if config.int_param(param).is_some_and(|n| n < 1) {
                        return Err(config.invalid(param, "must be at least 1"));
                    }
                }
                Ok(())
            }
            AggType::Metric(m) if m.is_sibling_pipeline() => {
                let target = config.str_param("bucket_agg").unwrap_or_default();
                match self.get(target) {
                    None => Err(AggError::DanglingAggReference {
                        agg_id: config.id.clone(),
                        target: target.to_string(),
                    }),
                    Some(bucket) if !bucket.is_bucket() => {
                        Err(config.invalid("bucket_agg", format!("'{}' is not a bucket aggregation", target)))
                    }
                    Some(_) => self.check_metric_ref(config, "metric_agg"),
                }
            }
            AggType::Metric(_) => Ok(()),
        }
    }

    fn check_terms(&self, config: &AggConfig) -> Result<()> {
        if !config.int_param("size").is_some_and(|n| n >= 1) {
            return Err(config.invalid("size", "must be at least 1"));
        }
        let order = config.str_param("order").unwrap_or_default();
        if order != "asc" && order != "desc" {
            return Err(config.invalid("order", "must be 'asc' or 'desc'"));
        }
        let order_by = config.str_param("order_by").unwrap_or(COUNT_REF);
        if order_by == COUNT_REF || order_by == KEY_REF {
            return Ok(());
        }
        self.check_metric_ref(config, "order_by")?;
        // Buckets cannot be sorted by values computed from their siblings
        match self.get(order_by).and_then(AggConfig::metric_type) {
            Some(m) if m.is_parent_pipeline() => Err(config.invalid(
                "order_by",
                format!("'{}' is a parent pipeline and cannot order buckets", order_by),
            )),
            _ => Ok(()),
        }
    }

    /// A metric reference must be `_count` or a single-value metric defined
    /// earlier in the list
    fn check_metric_ref(&self, config: &AggConfig, param: &str) -> Result<()> {
        let target = config.str_param(param).unwrap_or_default();
        if target == COUNT_REF {
            return Ok(());
        }
        let referenced = self
            .get(target)
            .ok_or_else(|| AggError::DanglingAggReference {
                agg_id: config.id.clone(),
                target: target.to_string(),
            })?;
        match referenced.metric_type() {
            None => Err(config.invalid(param, format!("'{}' is not a metric", target))),
            Some(MetricType::Percentiles) => Err(config.invalid(
                param,
                format!("'{}' is a multi-value metric and cannot be referenced", target),
            )),
            Some(m) if m.is_sibling_pipeline() => Err(config.invalid(
                param,
                format!("'{}' is a sibling pipeline and cannot be referenced", target),
            )),
            Some(_) => Ok(()),
        }
    }

    // =========================================================================
    // Request generation
    // =========================================================================

    /// Build the aggregation request, keyed by agg id
    pub fn to_dsl(&self, ctx: &DslContext<'_>) -> Result<Value> {
        let buckets = self.buckets();
        let metrics = self.metrics();

        let mut level_metrics = Map::new();
        let mut innermost_metrics = Map::new();
        for metric in metrics.iter().filter(|m| !is_sibling(m)) {
            let Some(dsl) = self.metric_dsl(metric)? else {
                continue;
            };
            if !is_parent(metric) {
                level_metrics.insert(metric.id.clone(), dsl.clone());
            }
            innermost_metrics.insert(metric.id.clone(), dsl);
        }

        if buckets.is_empty() {
            if let Some(pipeline) = metrics.iter().find(|m| is_parent(m)) {
                return Err(pipeline.invalid("metric_agg", "requires an enclosing histogram"));
            }
            return Ok(Value::Object(innermost_metrics));
        }

        let innermost = buckets.len() - 1;
        if let Some(pipeline) = metrics.iter().find(|m| is_parent(m))
            && !matches!(
                buckets[innermost].bucket_type(),
                Some(BucketType::DateHistogram | BucketType::Histogram)
            )
        {
            return Err(pipeline.invalid(
                "metric_agg",
                "requires the innermost bucket to be a histogram or date_histogram",
            ));
        }

        let mut inner: Option<Map<String, Value>> = None;
        for (depth, bucket) in buckets.iter().enumerate().rev() {
            let mut sub = inner.take().unwrap_or_default();
            if depth == innermost {
                sub.extend(innermost_metrics.clone());
            } else if ctx.metrics_at_all_levels {
                sub.extend(level_metrics.clone());
            }

            // Terms ordered by a metric need that metric beside the buckets
            if let Some(order_by) = bucket.str_param("order_by")
                && order_by != COUNT_REF
                && order_by != KEY_REF
                && !sub.contains_key(order_by)
                && let Some(metric) = self.get(order_by)
                && let Some(dsl) = self.metric_dsl(metric)?
            {
                sub.insert(metric.id.clone(), dsl);
            }

            let mut body = self.bucket_dsl(bucket, ctx)?;
            if !sub.is_empty() {
                body.insert("aggs".to_string(), Value::Object(sub));
            }

            let mut level = Map::new();
            level.insert(bucket.id.clone(), Value::Object(body));
            for sibling in metrics.iter().filter(|m| is_sibling(m)) {
                if sibling.str_param("bucket_agg") == Some(bucket.id.as_str()) {
                    let dsl = self.sibling_dsl(sibling, depth == innermost, ctx)?;
                    level.insert(sibling.id.clone(), dsl);
                }
            }
            inner = Some(level);
        }

        let dsl = inner.unwrap_or_default();
        tracing::debug!(
            buckets = buckets.len(),
            metrics = metrics.len(),
            "built aggregation request"
        );
        Ok(Value::Object(dsl))
    }

    fn bucket_dsl(&self, bucket: &AggConfig, ctx: &DslContext<'_>) -> Result<Map<String, Value>> {
        let Some(bucket_type) = bucket.bucket_type() else {
            return Ok(Map::new());
        };
        let mut body = Map::new();
        if bucket_type != BucketType::Filters {
            body.insert("field".to_string(), json!(bucket.field_name()));
        }

        match bucket_type {
            BucketType::DateHistogram => {
                let interval = bucket.str_param("interval").unwrap_or(AUTO);
                let interval = match ctx.time_range {
                    Some(range) => {
                        resolve_interval(interval, &range, ctx.bar_target, ctx.max_buckets)?
                            .interval
                            .to_string()
                    }
                    None if interval.trim() == AUTO => {
                        return Err(bucket.invalid("interval", "auto interval requires a time range"));
                    }
                    None => interval.trim().to_string(),
                };
                body.extend(date_histogram_interval(&interval)?);

                let min_doc_count = bucket.int_param("min_doc_count").unwrap_or(1);
                body.insert("min_doc_count".to_string(), json!(min_doc_count));

                let time_zone = bucket
                    .str_param("time_zone")
                    .map(str::to_string)
                    .or_else(|| ctx.query_config.date_format_tz.clone());
                if let Some(tz) = time_zone {
                    body.insert("time_zone".to_string(), json!(tz));
                }

                if let Some(bounds) = bucket.param("extended_bounds") {
                    body.insert("extended_bounds".to_string(), bounds.clone());
                } else if min_doc_count == 0
                    && let Some(range) = ctx.time_range
                {
                    body.insert(
                        "extended_bounds".to_string(),
                        json!({
                            "min": range.min.timestamp_millis(),
                            "max": range.max.timestamp_millis(),
                        }),
                    );
                }
            }
            BucketType::Histogram => {
                for name in ["interval", "min_doc_count", "extended_bounds"] {
                    if let Some(value) = bucket.param(name) {
                        body.insert(name.to_string(), value.clone());
                    }
                }
            }
            BucketType::Terms => {
                body.insert("size".to_string(), json!(bucket.int_param("size").unwrap_or(5)));
                let order = bucket.str_param("order").unwrap_or("desc");
                let order_by = match bucket.str_param("order_by").unwrap_or(COUNT_REF) {
                    key @ (COUNT_REF | KEY_REF) => key.to_string(),
                    id => self.metric_path(id),
                };
                body.insert("order".to_string(), json!({ order_by: order }));
            }
            BucketType::Range => {
                body.insert("ranges".to_string(), bucket.param("ranges").cloned().unwrap_or(json!([])));
            }
            BucketType::DateRange => {
                body.insert("ranges".to_string(), bucket.param("ranges").cloned().unwrap_or(json!([])));
                if let Some(tz) = bucket.str_param("time_zone") {
                    body.insert("time_zone".to_string(), json!(tz));
                }
            }
            BucketType::IpRange => {
                body.insert("ranges".to_string(), Value::Array(ip_ranges(bucket)?));
            }
            BucketType::Filters => {
                let mut filters = Map::new();
                for (label, query) in check_filters(bucket)? {
                    let dsl = build_opensearch_query(ctx.index, &[query], &[], &ctx.query_config)?;
                    filters.insert(label, dsl.to_json());
                }
                body.insert("filters".to_string(), Value::Object(filters));
            }
        }

        let mut out = Map::new();
        out.insert(bucket_type.as_str().to_string(), Value::Object(body));
        Ok(out)
    }

    /// DSL for a non-sibling metric; `None` for count, which reads doc_count
    fn metric_dsl(&self, metric: &AggConfig) -> Result<Option<Value>> {
        let Some(metric_type) = metric.metric_type() else {
            return Ok(None);
        };
        let field = metric.field_name();
        let dsl = match metric_type {
            MetricType::Count => return Ok(None),
            MetricType::Sum
            | MetricType::Avg
            | MetricType::Min
            | MetricType::Max
            | MetricType::Cardinality => json!({ metric_type.as_str(): { "field": field } }),
            MetricType::Median => json!({ "percentiles": { "field": field, "percents": [50] } }),
            MetricType::Percentiles => json!({
                "percentiles": {
                    "field": field,
                    "percents": metric.param("percents").cloned().unwrap_or(json!([])),
                }
            }),
            MetricType::Derivative | MetricType::CumulativeSum => json!({
                metric_type.as_str(): { "buckets_path": self.ref_path(metric, "metric_agg") }
            }),
            MetricType::MovingAvg => json!({
                "moving_fn": {
                    "buckets_path": self.ref_path(metric, "metric_agg"),
                    "window": metric.int_param("window").unwrap_or(5),
                    "script": MOVING_AVG_SCRIPT,
                }
            }),
            MetricType::SerialDiff => json!({
                "serial_diff": {
                    "buckets_path": self.ref_path(metric, "metric_agg"),
                    "lag": metric.int_param("lag").unwrap_or(1),
                }
            }),
            MetricType::AvgBucket
            | MetricType::SumBucket
            | MetricType::MinBucket
            | MetricType::MaxBucket => return Ok(None),
        };
        Ok(Some(dsl))
    }

    fn sibling_dsl(&self, sibling: &AggConfig, innermost: bool, ctx: &DslContext<'_>) -> Result<Value> {
        let bucket_id = sibling.str_param("bucket_agg").unwrap_or_default();
        let metric_ref = sibling.str_param("metric_agg").unwrap_or(COUNT_REF);
        let metric_is_count = self.metric_path(metric_ref) == COUNT_REF;
        if !metric_is_count && !innermost && !ctx.metrics_at_all_levels {
            return Err(sibling.invalid(
                "bucket_agg",
                format!("metric '{}' is not computed under bucket '{}'", metric_ref, bucket_id),
            ));
        }
        let path = format!("{}>{}", bucket_id, self.metric_path(metric_ref));
        let name = sibling.metric_type().map(|m| m.as_str()).unwrap_or_default();
        Ok(json!({ name: { "buckets_path": path } }))
    }

    fn ref_path(&self, config: &AggConfig, param: &str) -> String {
        self.metric_path(config.str_param(param).unwrap_or(COUNT_REF))
    }

    /// buckets_path segment for a metric id
    fn metric_path(&self, id: &str) -> String {
        match self.get(id).and_then(AggConfig::metric_type) {
            None | Some(MetricType::Count) => COUNT_REF.to_string(),
            Some(MetricType::Median) => format!("{}.50", id),
            Some(_) => id.to_string(),
        }
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// Display label; a `custom_label` param wins
    pub fn label(&self, config: &AggConfig) -> String {
        if let Some(custom) = config.str_param("custom_label")
            && !custom.trim().is_empty()
        {
            return custom.to_string();
        }

        let field = config.field_name();
        match config.agg_type {
            AggType::Bucket(BucketType::DateHistogram) => {
                match config.str_param("interval").map(parse_interval) {
                    Some(Ok(interval)) => format!("{} per {}", field, interval.describe()),
                    _ => field.to_string(),
                }
            }
            AggType::Bucket(BucketType::Histogram) => field.to_string(),
            AggType::Bucket(BucketType::Terms) => {
                let size = config.int_param("size").unwrap_or(5);
                let direction = if config.str_param("order") == Some("asc") {
                    "Bottom"
                } else {
                    "Top"
                };
                format!("{} {} {}", direction, size, field)
            }
            AggType::Bucket(BucketType::Range) => format!("{} ranges", field),
            AggType::Bucket(BucketType::DateRange) => format!("{} date ranges", field),
            AggType::Bucket(BucketType::IpRange) => format!("{} IP ranges", field),
            AggType::Bucket(BucketType::Filters) => "Filters".to_string(),
            AggType::Metric(MetricType::Count) => MetricType::Count.title().to_string(),
            AggType::Metric(m) if m.is_pipeline() => {
                let target = config.str_param("metric_agg").unwrap_or(COUNT_REF);
                let target = match self.get(target) {
                    Some(referenced) => self.label(referenced),
                    None => MetricType::Count.title().to_string(),
                };
                format!("{} {}", m.title(), target)
            }
            AggType::Metric(m) => format!("{} {}", m.title(), field),
        }
    }

    /// Label of the config with this id
    pub fn label_of(&self, id: &str) -> Option<String> {
        self.get(id).map(|c| self.label(c))
    }
}

impl<'a> IntoIterator for &'a AggConfigs {
    type Item = &'a AggConfig;
    type IntoIter = std::slice::Iter<'a, AggConfig>;

    fn into_iter(self) -> Self::IntoIter {
        self.configs.iter()
    }
}

fn is_parent(config: &AggConfig) -> bool {
    config.metric_type().is_some_and(|m| m.is_parent_pipeline())
}

fn is_sibling(config: &AggConfig) -> bool {
    config.metric_type().is_some_and(|m| m.is_sibling_pipeline())
}

// =============================================================================
// Param helpers
// =============================================================================

fn check_field(config: &AggConfig, index: Option<&IndexPattern>) -> Result<()> {
    if !config.agg_type.takes_field() {
        if config.field.is_some() {
            return Err(config.invalid("field", format!("{} does not take a field", config.agg_type)));
        }
        return Ok(());
    }

    let name = config.field.as_deref().ok_or_else(|| AggError::MissingParam {
        agg_id: config.id.clone(),
        param: "field".to_string(),
    })?;
    let Some(index) = index else {
        return Ok(());
    };

    let field = index.field(name).ok_or_else(|| AggError::UnknownField {
        agg_id: config.id.clone(),
        field: name.to_string(),
    })?;
    if !config.agg_type.accepts(field.kind) {
        return Err(AggError::FieldKindMismatch {
            agg_id: config.id.clone(),
            agg_type: config.agg_type.to_string(),
            field: name.to_string(),
            kind: field.kind,
        });
    }
    if !field.aggregatable {
        return Err(config.invalid("field", format!("'{}' is not aggregatable", name)));
    }
    Ok(())
}

/// Reject unknown params, check kinds, and fill defaults
fn fill_params(config: &mut AggConfig) -> Result<()> {
    let specs = config.agg_type.params();
    if let Some(unknown) = config
        .params
        .keys()
        .find(|name| !specs.iter().any(|s| s.name == name.as_str()))
    {
        return Err(config.invalid(unknown, "unknown parameter"));
    }

    for spec in specs {
        match config.params.get(spec.name) {
            Some(value) => check_kind(config, spec, value)?,
            None => {
                if let Some(default) = spec.default {
                    config.params.insert(spec.name.to_string(), default.to_json());
                } else if spec.required {
                    return Err(AggError::MissingParam {
                        agg_id: config.id.clone(),
                        param: spec.name.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn check_kind(config: &AggConfig, spec: &ParamSpec, value: &Value) -> Result<()> {
    let (ok, expected) = match spec.kind {
        ParamKind::String | ParamKind::Interval | ParamKind::AggRef => (value.is_string(), "a string"),
        ParamKind::Integer => (value.as_i64().is_some(), "an integer"),
        ParamKind::Number => (value.is_number(), "a number"),
        ParamKind::Bool => (value.is_boolean(), "a boolean"),
        ParamKind::Array => (value.is_array(), "an array"),
        ParamKind::Object => (value.is_object(), "an object"),
    };
    if ok {
        Ok(())
    } else {
        Err(config.invalid(spec.name, format!("expected {}", expected)))
    }
}

fn check_min_doc_count(config: &AggConfig) -> Result<()> {
    if config.int_param("min_doc_count").is_some_and(|n| n < 0) {
        return Err(config.invalid("min_doc_count", "must not be negative"));
    }
    Ok(())
}

fn range_entries(config: &AggConfig) -> Result<&Vec<Value>> {
    let ranges = config
        .param("ranges")
        .and_then(Value::as_array)
        .ok_or_else(|| config.invalid("ranges", "expected an array"))?;
    if ranges.is_empty() {
        return Err(config.invalid("ranges", "at least one range is required"));
    }
    Ok(ranges)
}

fn check_ranges(config: &AggConfig) -> Result<()> {
    for (i, range) in range_entries(config)?.iter().enumerate() {
        let has_bound = range
            .as_object()
            .is_some_and(|r| r.get("from").is_some_and(|v| !v.is_null()) || r.get("to").is_some_and(|v| !v.is_null()));
        if !has_bound {
            return Err(config.invalid("ranges", format!("range {} needs 'from' or 'to'", i)));
        }
    }
    Ok(())
}

fn check_ip_ranges(config: &AggConfig) -> Result<()> {
    ip_ranges(config).map(|_| ())
}

/// `mask` entries become `{key, from, to}`; `from`/`to` entries pass through
fn ip_ranges(config: &AggConfig) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    for (i, range) in range_entries(config)?.iter().enumerate() {
        let Some(entry) = range.as_object() else {
            return Err(config.invalid("ranges", format!("range {} is not an object", i)));
        };
        if let Some(mask) = entry.get("mask").and_then(Value::as_str) {
            let mask = CidrMask::parse(mask)?;
            let (from, to) = mask.range();
            let mut lowered = Map::new();
            lowered.insert("key".to_string(), json!(mask.to_string()));
            lowered.insert("from".to_string(), json!(from.to_string()));
            if let Some(to) = to {
                lowered.insert("to".to_string(), json!(to.to_string()));
            }
            out.push(Value::Object(lowered));
        } else if entry.get("from").is_some() || entry.get("to").is_some() {
            out.push(range.clone());
        } else {
            return Err(config.invalid("ranges", format!("range {} needs 'mask', 'from' or 'to'", i)));
        }
    }
    Ok(out)
}

/// Labelled queries of a `filters` bucket, in order
///
/// Each entry is `{"input": {"language": "kuery", "query": "..."}, "label": "..."}`.
/// The label defaults to the query text (`*` when empty).
pub(crate) fn check_filters(config: &AggConfig) -> Result<Vec<(String, Query)>> {
    let entries = config
        .param("filters")
        .and_then(Value::as_array)
        .ok_or_else(|| config.invalid("filters", "expected an array"))?;
    if entries.is_empty() {
        return Err(config.invalid("filters", "at least one filter is required"));
    }

    let mut out: Vec<(String, Query)> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let input = entry
            .get("input")
            .cloned()
            .ok_or_else(|| config.invalid("filters", format!("filter {} has no input", i)))?;
        let query: Query = serde_json::from_value(input)
            .map_err(|e| config.invalid("filters", format!("filter {}: {}", i, e)))?;

        let label = match entry.get("label").and_then(Value::as_str) {
            Some(label) if !label.trim().is_empty() => label.to_string(),
            _ if query.is_empty() => "*".to_string(),
            _ => query.text().to_string(),
        };
        if out.iter().any(|(existing, _)| *existing == label) {
            return Err(config.invalid("filters", format!("duplicate filter label '{}'", label)));
        }
        out.push((label, query));
    }
    Ok(out)
}

fn check_percents(config: &AggConfig) -> Result<()> {
    let percents = config
        .param("percents")
        .and_then(Value::as_array)
        .ok_or_else(|| config.invalid("percents", "expected an array"))?;
    if percents.is_empty() {
        return Err(config.invalid("percents", "at least one percent is required"));
    }
    let in_range = percents
        .iter()
        .all(|p| p.as_f64().is_some_and(|p| (0.0..=100.0).contains(&p)));
    if !in_range {
        return Err(config.invalid("percents", "values must be numbers between 0 and 100"));
    }
    Ok(())
}
