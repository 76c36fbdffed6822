//! Playback rows for the simulation phase.

use crate::ingest::{find_timestamp_column, parse_instant, Row, SYNTHETIC_TIMESTAMP_COLUMN};
use crate::models::SimulationRow;
use chrono::{DateTime, Utc};

/// Stand-in instant for rows whose timestamp does not parse.
pub fn zero_instant() -> DateTime<Utc> {
    DateTime::<Utc>::default()
}

/// Index the partition rows for step-by-step playback.
///
/// `row_index` is the position within the partition, not the source table.
/// Prediction and confidence are left for the prediction service to fill.
pub fn materialize(rows: Vec<Row>) -> Vec<SimulationRow> {
    let timestamp_column = rows
        .first()
        .and_then(|row| find_timestamp_column(row.columns()))
        .unwrap_or(SYNTHETIC_TIMESTAMP_COLUMN)
        .to_string();

    rows.into_iter()
        .enumerate()
        .map(|(row_index, data)| SimulationRow {
            row_index,
            timestamp: data
                .get(&timestamp_column)
                .and_then(parse_instant)
                .unwrap_or_else(zero_instant),
            prediction: None,
            confidence: None,
            data,
        })
        .collect()
}
