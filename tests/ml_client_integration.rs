//! Integration tests for the ML service client
//!
//! A local axum server on an ephemeral port stands in for the external
//! training/prediction service.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use splitbench_backend::{
    ingest::Row,
    ml::{MlServiceClient, PredictionService},
    models::DatasetId,
    EngineError,
};
use std::time::Duration;

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn train(Json(body): Json<Value>) -> Json<Value> {
    let training = body["training_data"].as_array().map(Vec::len).unwrap_or(0);
    let testing = body["testing_data"].as_array().map(Vec::len).unwrap_or(0);
    Json(json!({
        "model_id": format!("model_{}_{}_{}", body["dataset_id"].as_str().unwrap_or("?"), training, testing),
        "accuracy": 0.91,
        "precision": 0.88,
        "recall": 0.93,
        "f1_score": 0.904,
        "confusion_matrix": [[40, 5], [3, 52]],
    }))
}

async fn predict(Json(body): Json<Value>) -> Json<Value> {
    let pass = body["data"]["quality"] == "pass";
    Json(json!({
        "prediction": if pass { 1 } else { 0 },
        "confidence": if pass { 0.97 } else { 0.61 },
    }))
}

fn fake_ml_service() -> Router {
    Router::new()
        .route("/train", post(train))
        .route("/predict", post(predict))
        .route(
            "/health",
            get(|| async { Json(json!({"status": "healthy", "timestamp": "2024-01-01T00:00:00"})) }),
        )
        .route(
            "/models",
            get(|| async {
                Json(json!({"models": [
                    {"model_id": "model_1_70_15", "created_at": "2024-01-01T00:00:00", "feature_count": 4}
                ]}))
            }),
        )
}

fn rows() -> Vec<Row> {
    vec![
        Row::from_pairs([("temperature", "72.4"), ("quality", "pass")]),
        Row::from_pairs([("temperature", "88.1"), ("quality", "fail")]),
    ]
}

#[tokio::test]
async fn test_train_and_predict_roundtrip() {
    let base = spawn_server(fake_ml_service()).await;
    let client = MlServiceClient::new(base, Duration::from_secs(5));
    let rows = rows();

    let report = client.train(&rows, &rows[..1], DatasetId(3)).await.unwrap();
    assert_eq!(report.model_id, "model_3_2_1");
    assert_eq!(report.confusion_matrix, vec![vec![40, 5], vec![3, 52]]);
    assert!((report.f1_score - 0.904).abs() < 1e-9);

    let pass = client.predict(&report.model_id, &rows[0]).await.unwrap();
    let fail = client.predict(&report.model_id, &rows[1]).await.unwrap();
    assert_eq!(pass.prediction, 1);
    assert_eq!(fail.prediction, 0);
    assert!((fail.confidence - 0.61).abs() < 1e-9);
}

#[tokio::test]
async fn test_health_and_models() {
    let base = spawn_server(fake_ml_service()).await;
    let client = MlServiceClient::new(format!("{}/", base), Duration::from_secs(5));

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");

    let models = client.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].feature_count, 4);
}

#[tokio::test]
async fn test_error_status_becomes_service_error() {
    let app = Router::new().route(
        "/train",
        post(|| async { (StatusCode::BAD_REQUEST, "Training data is empty") }),
    );
    let base = spawn_server(app).await;
    let client = MlServiceClient::new(base, Duration::from_secs(5));
    let rows = rows();

    let err = client.train(&rows, &rows, DatasetId(1)).await.unwrap_err();
    assert!(matches!(err, EngineError::Service(_)));
    assert_eq!(err.to_string(), "ML service error: 400 - Training data is empty");
}

#[tokio::test]
async fn test_malformed_body_is_communication_error() {
    let app = Router::new().route("/predict", post(|| async { "not json" }));
    let base = spawn_server(app).await;
    let client = MlServiceClient::new(base, Duration::from_secs(5));

    let err = client.predict("m", &rows()[0]).await.unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Failed to communicate with ML service"));
}
