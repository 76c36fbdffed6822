//! SQLite-backed dataset store

use super::DatasetStore;
use crate::error::{EngineError, EngineResult};
use crate::models::{Dataset, DatasetId, DateRange, NewDataset};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row as SqlRow};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS datasets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    file_name TEXT NOT NULL,
    file_path TEXT NOT NULL,
    total_rows INTEGER NOT NULL,
    total_columns INTEGER NOT NULL,
    pass_rate REAL NOT NULL,
    earliest_timestamp TEXT,
    latest_timestamp TEXT,
    uploaded_at TEXT NOT NULL,
    training_start TEXT,
    training_end TEXT,
    testing_start TEXT,
    testing_end TEXT,
    simulation_start TEXT,
    simulation_end TEXT,
    training_record_count INTEGER,
    testing_record_count INTEGER,
    simulation_record_count INTEGER,
    model_id TEXT,
    is_model_trained INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 0
);
"#;

const SELECT_COLUMNS: &str = "id, file_name, file_path, total_rows, total_columns, pass_rate,
    earliest_timestamp, latest_timestamp, uploaded_at,
    training_start, training_end, testing_start, testing_end, simulation_start, simulation_end,
    training_record_count, testing_record_count, simulation_record_count,
    model_id, is_model_trained, version";

fn ts_to_sql(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn opt_ts_to_sql(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(ts_to_sql)
}

fn ts_from_sql(row: &SqlRow<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}

fn range_from_sql(
    row: &SqlRow<'_>,
    start_idx: usize,
) -> rusqlite::Result<Option<DateRange>> {
    let start = ts_from_sql(row, start_idx)?;
    let end = ts_from_sql(row, start_idx + 1)?;
    Ok(match (start, end) {
        (Some(start), Some(end)) => Some(DateRange::new(start, end)),
        _ => None,
    })
}

fn count_from_sql(row: &SqlRow<'_>, idx: usize) -> rusqlite::Result<Option<usize>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(|n| n.max(0) as usize))
}

fn dataset_from_row(row: &SqlRow<'_>) -> rusqlite::Result<Dataset> {
    let file_path: String = row.get(2)?;
    let uploaded_at = ts_from_sql(row, 8)?.unwrap_or_default();
    Ok(Dataset {
        id: DatasetId(row.get(0)?),
        file_name: row.get(1)?,
        file_path: PathBuf::from(file_path),
        total_rows: row.get::<_, i64>(3)?.max(0) as usize,
        total_columns: row.get::<_, i64>(4)?.max(0) as usize,
        pass_rate: row.get(5)?,
        earliest_timestamp: ts_from_sql(row, 6)?,
        latest_timestamp: ts_from_sql(row, 7)?,
        uploaded_at,
        training: range_from_sql(row, 9)?,
        testing: range_from_sql(row, 11)?,
        simulation: range_from_sql(row, 13)?,
        training_record_count: count_from_sql(row, 15)?,
        testing_record_count: count_from_sql(row, 16)?,
        simulation_record_count: count_from_sql(row, 17)?,
        model_id: row.get(18)?,
        is_model_trained: row.get::<_, i64>(19)? != 0,
        version: row.get::<_, i64>(20)?.max(0) as u64,
    })
}

/// Dataset store over a single SQLite connection.
#[derive(Clone)]
pub struct SqliteDatasetStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatasetStore {
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags)?;
        let store = Self::init(conn)?;
        info!("dataset store initialized at {}", db_path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> EngineResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> EngineResult<Self> {
        conn.execute_batch(SCHEMA_SQL)?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" && journal_mode.to_lowercase() != "memory" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM datasets", [], |row| row.get(0))
            .unwrap_or(0);
        debug!(datasets = count, "existing datasets in store");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl DatasetStore for SqliteDatasetStore {
    fn create(&self, dataset: NewDataset) -> EngineResult<Dataset> {
        let uploaded_at = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO datasets
             (file_name, file_path, total_rows, total_columns, pass_rate,
              earliest_timestamp, latest_timestamp, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                dataset.file_name,
                dataset.file_path.to_string_lossy().into_owned(),
                dataset.total_rows as i64,
                dataset.total_columns as i64,
                dataset.pass_rate,
                opt_ts_to_sql(dataset.earliest_timestamp),
                opt_ts_to_sql(dataset.latest_timestamp),
                ts_to_sql(uploaded_at),
            ],
        )?;
        let id = DatasetId(conn.last_insert_rowid());
        drop(conn);

        debug!(dataset_id = %id, file = %dataset.file_name, "dataset created");
        self.load(id)
    }

    fn load(&self, id: DatasetId) -> EngineResult<Dataset> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM datasets WHERE id = ?1", SELECT_COLUMNS);
        conn.query_row(&sql, params![id.0], dataset_from_row)
            .optional()?
            .ok_or(EngineError::NotFound(id))
    }

    fn save(&self, dataset: &Dataset) -> EngineResult<Dataset> {
        let range_cols = |range: Option<DateRange>| {
            (
                range.map(|r| ts_to_sql(r.start)),
                range.map(|r| ts_to_sql(r.end)),
            )
        };
        let (training_start, training_end) = range_cols(dataset.training);
        let (testing_start, testing_end) = range_cols(dataset.testing);
        let (simulation_start, simulation_end) = range_cols(dataset.simulation);

        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE datasets SET
                file_name = ?2, file_path = ?3, total_rows = ?4, total_columns = ?5,
                pass_rate = ?6, earliest_timestamp = ?7, latest_timestamp = ?8,
                training_start = ?9, training_end = ?10,
                testing_start = ?11, testing_end = ?12,
                simulation_start = ?13, simulation_end = ?14,
                training_record_count = ?15, testing_record_count = ?16,
                simulation_record_count = ?17,
                model_id = ?18, is_model_trained = ?19,
                version = version + 1
             WHERE id = ?1 AND version = ?20",
            params![
                dataset.id.0,
                dataset.file_name,
                dataset.file_path.to_string_lossy().into_owned(),
                dataset.total_rows as i64,
                dataset.total_columns as i64,
                dataset.pass_rate,
                opt_ts_to_sql(dataset.earliest_timestamp),
                opt_ts_to_sql(dataset.latest_timestamp),
                training_start,
                training_end,
                testing_start,
                testing_end,
                simulation_start,
                simulation_end,
                dataset.training_record_count.map(|n| n as i64),
                dataset.testing_record_count.map(|n| n as i64),
                dataset.simulation_record_count.map(|n| n as i64),
                dataset.model_id,
                dataset.is_model_trained as i64,
                dataset.version as i64,
            ],
        )?;

        if changed == 0 {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT version FROM datasets WHERE id = ?1",
                    params![dataset.id.0],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match found {
                None => EngineError::NotFound(dataset.id),
                Some(found) => EngineError::Conflict {
                    id: dataset.id,
                    expected: dataset.version,
                    found: found.max(0) as u64,
                },
            });
        }

        let mut saved = dataset.clone();
        saved.version += 1;
        Ok(saved)
    }
}
