//! End-to-end workflow over the public API: upload, range validation,
//! partition reads, training and simulation playback against a local
//! stand-in for the ML service.

use axum::{routing::post, Json, Router};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use splitbench_backend::{
    ingest::Table,
    ml::MlServiceClient,
    models::{DatasetId, DateRange, DateRangeRequest, Phase},
    store::{DatasetStore, SqliteDatasetStore},
    DatasetService,
};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

async fn spawn_ml_service() -> String {
    let app = Router::new()
        .route(
            "/train",
            post(|Json(body): Json<Value>| async move {
                let training = body["training_data"].as_array().map(Vec::len).unwrap_or(0);
                Json(json!({
                    "model_id": format!("model_{}", training),
                    "accuracy": 0.9,
                    "precision": 0.9,
                    "recall": 0.9,
                    "f1_score": 0.9,
                    "confusion_matrix": [[1, 0], [0, 1]],
                }))
            }),
        )
        .route(
            "/predict",
            post(|| async { Json(json!({"prediction": 1, "confidence": 0.8})) }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn sensor_csv(rows: usize) -> String {
    let mut csv = String::from("temperature,pressure,quality\n");
    for i in 0..rows {
        let quality = if i % 10 < 8 { "pass" } else { "fail" };
        writeln!(csv, "{:.1},{:.2},{}", 70.0 + (i % 7) as f64, 1.2, quality).unwrap();
    }
    csv
}

#[tokio::test]
async fn test_full_workflow_with_positional_split() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("splitbench.db");
    let store = Arc::new(SqliteDatasetStore::open(&db_path).unwrap());
    let service = DatasetService::new(store, dir.path().join("uploads"));
    let ml = MlServiceClient::new(spawn_ml_service().await, Duration::from_secs(5));

    let summary = service
        .ingest_upload("line3.csv", sensor_csv(100).as_bytes())
        .unwrap();
    assert_eq!(summary.total_rows, 100);
    assert_eq!(summary.total_columns, 4);
    assert!((summary.pass_rate - 0.8).abs() < 1e-9);

    // The stored source now carries the synthetic time axis
    let dataset = service.dataset(summary.dataset_id).unwrap();
    let source = Table::read_path(&dataset.file_path).unwrap();
    assert_eq!(source.columns().last().map(String::as_str), Some("timestamp"));

    let day = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let same_day = DateRange::new(day, day);
    let response = service
        .validate_date_ranges(&DateRangeRequest {
            dataset_id: summary.dataset_id,
            training: same_day,
            testing: same_day,
            simulation: same_day,
        })
        .unwrap();
    assert!(response.is_valid);
    assert!(response.positional_fallback);
    assert_eq!(
        (response.counts.training, response.counts.testing, response.counts.simulation),
        (70, 15, 15)
    );

    let testing = service
        .data_for_range(summary.dataset_id, Some(Phase::Testing), day, day)
        .unwrap();
    assert_eq!(testing.len(), 15);

    let report = service.train_model(summary.dataset_id, &ml).await.unwrap();
    assert_eq!(report.model_id, "model_70");

    let rows = service.simulation_rows(summary.dataset_id).unwrap();
    assert_eq!(rows.len(), 15);
    let mut completed_at = None;
    for row in rows {
        let index = row.row_index;
        let step = service.simulate_step(summary.dataset_id, row, &ml).await.unwrap();
        assert_eq!(step.row.prediction, Some(1));
        if step.is_completed {
            completed_at = Some(index);
            break;
        }
    }
    assert_eq!(completed_at, Some(14));

    // Metadata survives a reopen of the database
    let reopened = SqliteDatasetStore::open(&db_path).unwrap();
    let persisted = reopened.load(summary.dataset_id).unwrap();
    assert!(persisted.is_model_trained);
    assert_eq!(persisted.model_id.as_deref(), Some("model_70"));
    assert_eq!(persisted.simulation_record_count, Some(15));
}

#[tokio::test]
async fn test_unreachable_service_keeps_model_untrained() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteDatasetStore::open_in_memory().unwrap());
    let service = DatasetService::new(store, dir.path().join("uploads"));
    let ml = MlServiceClient::new("http://127.0.0.1:9", Duration::from_millis(500));

    let id = service
        .ingest_upload("line3.csv", sensor_csv(30).as_bytes())
        .unwrap()
        .dataset_id;
    let day = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let same_day = DateRange::new(day, day);
    service
        .validate_date_ranges(&DateRangeRequest {
            dataset_id: id,
            training: same_day,
            testing: same_day,
            simulation: same_day,
        })
        .unwrap();

    assert!(service.train_model(id, &ml).await.is_err());
    let dataset = service.dataset(id).unwrap();
    assert!(!dataset.is_model_trained);
    assert_eq!(dataset.training_record_count, Some(21));
}

#[test]
fn test_unknown_dataset() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteDatasetStore::open_in_memory().unwrap());
    let service = DatasetService::new(store, dir.path().join("uploads"));

    assert!(service.summary(DatasetId(99)).is_err());
    assert!(service.simulation_rows(DatasetId(99)).is_err());
}
