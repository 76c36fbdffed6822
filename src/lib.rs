//! Splitbench Backend Library
//!
//! CSV ingestion, schema inference and temporal train/test/simulation
//! partitioning, with dataset metadata kept in SQLite and model work handed
//! to an external prediction service.

pub mod config;
pub mod error;
pub mod ingest;
pub mod ml;
pub mod models;
pub mod partition;
pub mod service;
pub mod store;

pub use error::{EngineError, EngineResult};
pub use service::DatasetService;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{Dataset, DatasetId};
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    /// Freshly ingested dataset: no ranges, no model.
    pub fn dataset_fixture() -> Dataset {
        Dataset {
            id: DatasetId(1),
            file_name: "fixture.csv".into(),
            file_path: PathBuf::from("fixture.csv"),
            total_rows: 100,
            total_columns: 3,
            pass_rate: 0.75,
            earliest_timestamp: None,
            latest_timestamp: None,
            uploaded_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            training: None,
            testing: None,
            simulation: None,
            training_record_count: None,
            testing_record_count: None,
            simulation_record_count: None,
            model_id: None,
            is_model_trained: false,
            version: 0,
        }
    }
}
