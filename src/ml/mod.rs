//! External model training / prediction service.
//!
//! The engine implements no model. It ships row batches to a remote service
//! and records what comes back.

pub mod client;

pub use client::MlServiceClient;

use crate::error::EngineResult;
use crate::ingest::Row;
use crate::models::DatasetId;
use serde::{Deserialize, Serialize};

/// Metrics returned by a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_id: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    /// 2x2 grid for the binary pass/fail case.
    #[serde(default)]
    pub confusion_matrix: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 = pass, 0 = fail.
    pub prediction: u8,
    pub confidence: f64,
}

#[async_trait::async_trait]
pub trait PredictionService: Send + Sync {
    async fn train(
        &self,
        training: &[Row],
        testing: &[Row],
        dataset_id: DatasetId,
    ) -> EngineResult<TrainingReport>;

    async fn predict(&self, model_id: &str, row: &Row) -> EngineResult<Prediction>;
}
