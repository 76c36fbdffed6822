//! CSV ingestion: parse, infer column roles, compute metadata.
//!
//! Ingestion is two-pass. When the source has no time axis a synthetic one is
//! appended and the file is rewritten, so every later read of the source sees
//! the same timestamps the metadata was computed from.

pub mod metadata;
pub mod schema;
pub mod table;

pub use metadata::{is_pass_value, parse_instant, pass_rate, timestamp_range, TableMetrics};
pub use schema::{
    find_target_column, find_timestamp_column, infer_target, infer_timestamp,
    SYNTHETIC_TIMESTAMP_COLUMN,
};
pub use table::{Row, Table};

use crate::error::EngineResult;
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{debug, info};

/// Everything ingestion learns about a source file.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub table: Table,
    pub metrics: TableMetrics,
    pub timestamp_column: String,
    /// The source was rewritten with a synthetic `timestamp` column.
    pub rewritten: bool,
}

/// Ingest the CSV at `path`, rewriting it in place if a synthetic timestamp
/// column is needed.
///
/// The caller must hold exclusive access to `path` for the duration.
pub fn ingest_file(path: &Path, now: DateTime<Utc>) -> EngineResult<IngestOutcome> {
    let parsed = Table::read_path(path)?;
    debug!(
        path = %path.display(),
        rows = parsed.len(),
        columns = parsed.columns().len(),
        "parsed CSV source"
    );

    let inferred = infer_timestamp(&parsed, now)?;
    if !inferred.has_native_timestamp {
        inferred.table.write_path(path)?;
        info!(
            path = %path.display(),
            rows = inferred.table.len(),
            "appended synthetic timestamp column and rewrote source"
        );
    }

    let target = infer_target(&inferred.table);
    let metrics = TableMetrics::compute(&inferred.table, &target, &inferred.timestamp_column);
    info!(
        rows = metrics.total_rows,
        columns = metrics.total_columns,
        target = %metrics.target_column,
        pass_rate = metrics.pass_rate,
        "computed dataset metadata"
    );

    Ok(IngestOutcome {
        table: inferred.table,
        metrics,
        timestamp_column: inferred.timestamp_column,
        rewritten: !inferred.has_native_timestamp,
    })
}
