//! Column-role inference: which column carries time, which carries the
//! pass/fail outcome.
//!
//! Selection works on the header alone so the priority rules can be checked
//! without building a table. Header order always wins over candidate order.

use super::table::Table;
use crate::error::EngineResult;
use chrono::{DateTime, Duration, Timelike, Utc};

/// Name given to the synthesized time axis.
pub const SYNTHETIC_TIMESTAMP_COLUMN: &str = "timestamp";

/// Rendering used for synthesized timestamps on disk.
pub const SYNTHETIC_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_MARKERS: [&str; 3] = ["timestamp", "time", "date"];

const TARGET_MARKERS: [&str; 10] = [
    "quality", "result", "pass", "fail", "target", "class", "label", "response", "output", "y",
];

fn matches_any(column: &str, markers: &[&str]) -> bool {
    let lowered = column.to_lowercase();
    markers.iter().any(|m| lowered.contains(m))
}

/// First column whose name looks like a time axis.
pub fn find_timestamp_column(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .find(|c| matches_any(c, &TIMESTAMP_MARKERS))
        .map(String::as_str)
}

/// Column carrying the pass/fail outcome.
///
/// First column in header order whose name contains any target marker; the
/// last column otherwise; `None` only for an empty header.
pub fn find_target_column(columns: &[String]) -> Option<&str> {
    columns
        .iter()
        .find(|c| matches_any(c, &TARGET_MARKERS))
        .or_else(|| columns.last())
        .map(String::as_str)
}

/// Target column name, or the empty string when the table has no columns.
pub fn infer_target(table: &Table) -> String {
    find_target_column(table.columns())
        .unwrap_or_default()
        .to_string()
}

/// Result of timestamp inference.
#[derive(Debug, Clone)]
pub struct TimestampInference {
    pub table: Table,
    pub timestamp_column: String,
    /// False when the column was synthesized and the source must be rewritten.
    pub has_native_timestamp: bool,
}

/// Ensure the table has a time axis.
///
/// With no timestamp-like column, a `timestamp` column is appended whose
/// values start at `now - row_count days` (whole seconds) and advance one
/// second per row.
pub fn infer_timestamp(table: &Table, now: DateTime<Utc>) -> EngineResult<TimestampInference> {
    if let Some(column) = find_timestamp_column(table.columns()) {
        return Ok(TimestampInference {
            timestamp_column: column.to_string(),
            table: table.clone(),
            has_native_timestamp: true,
        });
    }

    let values = synthetic_timestamps(table.len(), now)
        .into_iter()
        .map(|ts| ts.format(SYNTHETIC_TIMESTAMP_FORMAT).to_string())
        .collect();

    Ok(TimestampInference {
        table: table.with_column(SYNTHETIC_TIMESTAMP_COLUMN, values)?,
        timestamp_column: SYNTHETIC_TIMESTAMP_COLUMN.to_string(),
        has_native_timestamp: false,
    })
}

/// Strictly increasing, gap-free instants: `row_count` values one second apart.
pub fn synthetic_timestamps(row_count: usize, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let now = now.with_nanosecond(0).unwrap_or(now);
    let start = now - Duration::days(row_count as i64);
    (0..row_count)
        .map(|i| start + Duration::seconds(i as i64))
        .collect()
}
