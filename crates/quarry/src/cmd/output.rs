//! Rendering command results for the terminal

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use quarry_aggs::TabbedTable;

/// Widest a table cell may get before it is truncated
const MAX_CELL_WIDTH: usize = 50;

/// Output format for tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(format!("unknown format '{}' (expected table, json or csv)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Parse the `--format` flag
pub fn parse_format(format: &str) -> Result<OutputFormat> {
    format
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid format: {}", e))
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a table in the requested format
pub fn print_table(table: &TabbedTable, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Table => render_table(table),
        OutputFormat::Json => render_json(table)?,
        OutputFormat::Csv => render_csv(table),
    };
    println!("{}", rendered);
    Ok(())
}

/// ASCII table with a header row
pub fn render_table(table: &TabbedTable) -> String {
    if table.is_empty() {
        return "(empty result)".to_string();
    }

    let rows: Vec<Vec<String>> = table
        .to_arrays()
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = table
        .columns
        .iter()
        .map(|c| c.name.chars().count())
        .collect();
    for row in &rows {
        for (i, value) in row.iter().enumerate() {
            widths[i] = widths[i].max(value.chars().count());
        }
    }
    for w in &mut widths {
        *w = (*w).min(MAX_CELL_WIDTH);
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    let header: Vec<String> = table
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| cell(&c.name, *w))
        .collect();
    lines.push(header.join(" | "));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    lines.push(sep.join("-+-"));

    for row in &rows {
        let values: Vec<String> = row.iter().zip(&widths).map(|(v, w)| cell(v, *w)).collect();
        lines.push(values.join(" | "));
    }

    lines
        .iter()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

/// JSON array of objects keyed by column name
pub fn render_json(table: &TabbedTable) -> Result<String> {
    let objects: Vec<Map<String, Value>> = table
        .to_arrays()
        .into_iter()
        .map(|row| {
            table
                .columns
                .iter()
                .zip(row)
                .map(|(col, val)| (col.name.clone(), val))
                .collect()
        })
        .collect();

    Ok(serde_json::to_string_pretty(&objects)?)
}

pub fn render_csv(table: &TabbedTable) -> String {
    let header: Vec<String> = table
        .columns
        .iter()
        .map(|c| csv_escape(&Value::String(c.name.clone())))
        .collect();

    let mut lines = vec![header.join(",")];
    for row in table.to_arrays() {
        let values: Vec<String> = row.iter().map(csv_escape).collect();
        lines.push(values.join(","));
    }
    lines.join("\n")
}

/// Format a JSON value for display
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(obj) => serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string()),
    }
}

/// Escape value for CSV output
pub fn csv_escape(value: &Value) -> String {
    let s = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => format_value(other),
    };

    if s.contains(',') || s.contains('\n') || s.contains('"') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s
    }
}

fn cell(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let cut: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        format!("{:width$}", value, width = width)
    }
}
