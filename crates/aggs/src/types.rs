//! Aggregation type registry
//!
//! Every bucket and metric type carries a parameter schema and the field
//! kinds it accepts. The registry is static: types are a closed set.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use quarry_query::FieldKind;

/// Bucket aggregation types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BucketType {
    DateHistogram,
    Histogram,
    Terms,
    Range,
    DateRange,
    IpRange,
    Filters,
}

/// Metric aggregation types, including pipelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    Median,
    Percentiles,
    Cardinality,
    // Parent pipelines
    Derivative,
    CumulativeSum,
    MovingAvg,
    SerialDiff,
    // Sibling pipelines
    AvgBucket,
    SumBucket,
    MinBucket,
    MaxBucket,
}

/// Bucket or metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    Bucket,
    Metric,
}

/// Any aggregation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AggType {
    Bucket(BucketType),
    Metric(MetricType),
}

/// Kind of value a parameter holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Bool,
    /// Interval text or `auto`
    Interval,
    /// Array of objects or scalars
    Array,
    Object,
    /// Id of another aggregation (or `_count` / `_key` where allowed)
    AggRef,
}

/// A parameter of an aggregation type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

/// Static default value of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Str(&'static str),
    Int(i64),
    Bool(bool),
    Numbers(&'static [f64]),
}

impl DefaultValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => json!(s),
            Self::Int(n) => json!(n),
            Self::Bool(b) => json!(b),
            Self::Numbers(ns) => json!(ns),
        }
    }
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
        default: None,
    }
}

const fn optional(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        default: None,
    }
}

const fn defaulted(name: &'static str, kind: ParamKind, default: DefaultValue) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
        default: Some(default),
    }
}

const CUSTOM_LABEL: ParamSpec = optional("custom_label", ParamKind::String);

const NUMERIC: &[FieldKind] = &[FieldKind::Number];
const NUMERIC_OR_DATE: &[FieldKind] = &[FieldKind::Number, FieldKind::Date];
const DATE: &[FieldKind] = &[FieldKind::Date];
const IP: &[FieldKind] = &[FieldKind::Ip];
const TERMS_KINDS: &[FieldKind] = &[
    FieldKind::String,
    FieldKind::Number,
    FieldKind::Date,
    FieldKind::Boolean,
    FieldKind::Ip,
];
const CARDINALITY_KINDS: &[FieldKind] = TERMS_KINDS;
const NONE: &[FieldKind] = &[];

/// Default percents for the percentiles metric
pub const DEFAULT_PERCENTS: &[f64] = &[1.0, 5.0, 25.0, 50.0, 75.0, 95.0, 99.0];

// =============================================================================
// Bucket types
// =============================================================================

impl BucketType {
    pub const ALL: &'static [BucketType] = &[
        Self::DateHistogram,
        Self::Histogram,
        Self::Terms,
        Self::Range,
        Self::DateRange,
        Self::IpRange,
        Self::Filters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DateHistogram => "date_histogram",
            Self::Histogram => "histogram",
            Self::Terms => "terms",
            Self::Range => "range",
            Self::DateRange => "date_range",
            Self::IpRange => "ip_range",
            Self::Filters => "filters",
        }
    }

    /// Field kinds accepted; empty means the type takes no field
    pub fn field_kinds(&self) -> &'static [FieldKind] {
        match self {
            Self::DateHistogram | Self::DateRange => DATE,
            Self::Histogram | Self::Range => NUMERIC,
            Self::Terms => TERMS_KINDS,
            Self::IpRange => IP,
            Self::Filters => NONE,
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        const DATE_HISTOGRAM: &[ParamSpec] = &[
            defaulted("interval", ParamKind::Interval, DefaultValue::Str("auto")),
            defaulted("min_doc_count", ParamKind::Integer, DefaultValue::Int(1)),
            optional("time_zone", ParamKind::String),
            optional("extended_bounds", ParamKind::Object),
            defaulted("drop_partials", ParamKind::Bool, DefaultValue::Bool(false)),
            CUSTOM_LABEL,
        ];
        const HISTOGRAM: &[ParamSpec] = &[
            required("interval", ParamKind::Number),
            defaulted("min_doc_count", ParamKind::Integer, DefaultValue::Int(1)),
            optional("extended_bounds", ParamKind::Object),
            CUSTOM_LABEL,
        ];
        const TERMS: &[ParamSpec] = &[
            defaulted("size", ParamKind::Integer, DefaultValue::Int(5)),
            defaulted("order", ParamKind::String, DefaultValue::Str("desc")),
            defaulted("order_by", ParamKind::AggRef, DefaultValue::Str("_count")),
            CUSTOM_LABEL,
        ];
        const RANGES: &[ParamSpec] = &[required("ranges", ParamKind::Array), CUSTOM_LABEL];
        const DATE_RANGES: &[ParamSpec] = &[
            required("ranges", ParamKind::Array),
            optional("time_zone", ParamKind::String),
            CUSTOM_LABEL,
        ];
        const FILTERS: &[ParamSpec] = &[required("filters", ParamKind::Array), CUSTOM_LABEL];

        match self {
            Self::DateHistogram => DATE_HISTOGRAM,
            Self::Histogram => HISTOGRAM,
            Self::Terms => TERMS,
            Self::Range | Self::IpRange => RANGES,
            Self::DateRange => DATE_RANGES,
            Self::Filters => FILTERS,
        }
    }
}

// =============================================================================
// Metric types
// =============================================================================

impl MetricType {
    pub const ALL: &'static [MetricType] = &[
        Self::Count,
        Self::Sum,
        Self::Avg,
        Self::Min,
        Self::Max,
        Self::Median,
        Self::Percentiles,
        Self::Cardinality,
        Self::Derivative,
        Self::CumulativeSum,
        Self::MovingAvg,
        Self::SerialDiff,
        Self::AvgBucket,
        Self::SumBucket,
        Self::MinBucket,
        Self::MaxBucket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::Median => "median",
            Self::Percentiles => "percentiles",
            Self::Cardinality => "cardinality",
            Self::Derivative => "derivative",
            Self::CumulativeSum => "cumulative_sum",
            Self::MovingAvg => "moving_avg",
            Self::SerialDiff => "serial_diff",
            Self::AvgBucket => "avg_bucket",
            Self::SumBucket => "sum_bucket",
            Self::MinBucket => "min_bucket",
            Self::MaxBucket => "max_bucket",
        }
    }

    /// Computed from another metric inside each bucket of the enclosing
    /// histogram
    pub fn is_parent_pipeline(&self) -> bool {
        matches!(
            self,
            Self::Derivative | Self::CumulativeSum | Self::MovingAvg | Self::SerialDiff
        )
    }

    /// Computed across the buckets of a sibling bucket aggregation
    pub fn is_sibling_pipeline(&self) -> bool {
        matches!(
            self,
            Self::AvgBucket | Self::SumBucket | Self::MinBucket | Self::MaxBucket
        )
    }

    pub fn is_pipeline(&self) -> bool {
        self.is_parent_pipeline() || self.is_sibling_pipeline()
    }

    /// Field kinds accepted; empty means the type takes no field
    pub fn field_kinds(&self) -> &'static [FieldKind] {
        match self {
            Self::Sum | Self::Avg => NUMERIC,
            Self::Min | Self::Max | Self::Median | Self::Percentiles => NUMERIC_OR_DATE,
            Self::Cardinality => CARDINALITY_KINDS,
            _ => NONE,
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        const PLAIN: &[ParamSpec] = &[CUSTOM_LABEL];
        const PERCENTILES: &[ParamSpec] = &[
            defaulted(
                "percents",
                ParamKind::Array,
                DefaultValue::Numbers(DEFAULT_PERCENTS),
            ),
            CUSTOM_LABEL,
        ];
        const PARENT: &[ParamSpec] = &[required("metric_agg", ParamKind::AggRef), CUSTOM_LABEL];
        const MOVING_AVG: &[ParamSpec] = &[
            required("metric_agg", ParamKind::AggRef),
            defaulted("window", ParamKind::Integer, DefaultValue::Int(5)),
            CUSTOM_LABEL,
        ];
        const SERIAL_DIFF: &[ParamSpec] = &[
            required("metric_agg", ParamKind::AggRef),
            defaulted("lag", ParamKind::Integer, DefaultValue::Int(1)),
            CUSTOM_LABEL,
        ];
        const SIBLING: &[ParamSpec] = &[
            required("bucket_agg", ParamKind::AggRef),
            defaulted("metric_agg", ParamKind::AggRef, DefaultValue::Str("_count")),
            CUSTOM_LABEL,
        ];

        match self {
            Self::Percentiles => PERCENTILES,
            Self::Derivative | Self::CumulativeSum => PARENT,
            Self::MovingAvg => MOVING_AVG,
            Self::SerialDiff => SERIAL_DIFF,
            Self::AvgBucket | Self::SumBucket | Self::MinBucket | Self::MaxBucket => SIBLING,
            _ => PLAIN,
        }
    }

    /// Label prefix used when no custom label is given
    pub fn title(&self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Sum => "Sum of",
            Self::Avg => "Average",
            Self::Min => "Min",
            Self::Max => "Max",
            Self::Median => "Median",
            Self::Percentiles => "Percentiles of",
            Self::Cardinality => "Unique count of",
            Self::Derivative => "Derivative of",
            Self::CumulativeSum => "Cumulative sum of",
            Self::MovingAvg => "Moving avg of",
            Self::SerialDiff => "Serial diff of",
            Self::AvgBucket => "Overall average of",
            Self::SumBucket => "Overall sum of",
            Self::MinBucket => "Overall min of",
            Self::MaxBucket => "Overall max of",
        }
    }
}

// =============================================================================
// AggType
// =============================================================================

impl AggType {
    /// Parse a type name
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        BucketType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .map(|t| Self::Bucket(*t))
            .or_else(|| {
                MetricType::ALL
                    .iter()
                    .find(|t| t.as_str() == s)
                    .map(|t| Self::Metric(*t))
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bucket(b) => b.as_str(),
            Self::Metric(m) => m.as_str(),
        }
    }

    pub fn schema(&self) -> Schema {
        match self {
            Self::Bucket(_) => Schema::Bucket,
            Self::Metric(_) => Schema::Metric,
        }
    }

    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Self::Bucket(b) => b.params(),
            Self::Metric(m) => m.params(),
        }
    }

    pub fn field_kinds(&self) -> &'static [FieldKind] {
        match self {
            Self::Bucket(b) => b.field_kinds(),
            Self::Metric(m) => m.field_kinds(),
        }
    }

    /// Whether the type operates on a field
    pub fn takes_field(&self) -> bool {
        !self.field_kinds().is_empty()
    }

    pub fn accepts(&self, kind: FieldKind) -> bool {
        self.field_kinds().contains(&kind)
    }
}

impl fmt::Display for AggType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for AggType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("unknown aggregation type '{}'", s))
    }
}

impl From<AggType> for String {
    fn from(t: AggType) -> Self {
        t.as_str().to_string()
    }
}

/// Aggregation types offered for a field of the given kind
pub fn agg_types_for_field(kind: FieldKind) -> Vec<AggType> {
    BucketType::ALL
        .iter()
        .map(|b| AggType::Bucket(*b))
        .chain(MetricType::ALL.iter().map(|m| AggType::Metric(*m)))
        .filter(|t| t.accepts(kind))
        .collect()
}
