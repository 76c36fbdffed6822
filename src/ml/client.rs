//! HTTP client for the ML service

use super::{Prediction, PredictionService, TrainingReport};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::ingest::Row;
use crate::models::DatasetId;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Longest error body echoed back to the caller.
const ERROR_BODY_LIMIT: usize = 800;

#[derive(Debug, Serialize)]
struct TrainRequest<'a> {
    dataset_id: String,
    training_data: &'a [Row],
    testing_data: &'a [Row],
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    model_id: &'a str,
    data: &'a Row,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub created_at: String,
    pub feature_count: usize,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    models: Vec<ModelInfo>,
}

#[derive(Clone)]
pub struct MlServiceClient {
    http: Client,
    base_url: String,
}

impl MlServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("splitbench/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.ml_service_url.clone(),
            Duration::from_secs(config.ml_service_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a response into `T`, mapping non-2xx statuses to service errors.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> EngineResult<T> {
        let status = resp.status();
        let body = resp.text().await.map_err(communication_error)?;

        if !status.is_success() {
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(EngineError::Service(format!(
                "ML service error: {} - {}",
                status.as_u16(),
                snippet
            )));
        }

        serde_json::from_str(&body).map_err(communication_error)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> EngineResult<T> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(communication_error)?;
        Self::decode(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> EngineResult<T> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(communication_error)?;
        Self::decode(resp).await
    }

    pub async fn health(&self) -> EngineResult<ServiceHealth> {
        self.get("health").await
    }

    pub async fn list_models(&self) -> EngineResult<Vec<ModelInfo>> {
        let list: ModelList = self.get("models").await?;
        Ok(list.models)
    }
}

fn communication_error(e: impl std::fmt::Display) -> EngineError {
    EngineError::Service(format!("Failed to communicate with ML service: {}", e))
}

#[async_trait::async_trait]
impl PredictionService for MlServiceClient {
    async fn train(
        &self,
        training: &[Row],
        testing: &[Row],
        dataset_id: DatasetId,
    ) -> EngineResult<TrainingReport> {
        let start = Instant::now();
        let request = TrainRequest {
            dataset_id: dataset_id.to_string(),
            training_data: training,
            testing_data: testing,
        };

        let report: TrainingReport = self.post("train", &request).await?;
        info!(
            dataset_id = %dataset_id,
            model_id = %report.model_id,
            accuracy = report.accuracy,
            latency_ms = start.elapsed().as_millis() as u64,
            "model trained"
        );
        Ok(report)
    }

    async fn predict(&self, model_id: &str, row: &Row) -> EngineResult<Prediction> {
        let request = PredictRequest {
            model_id,
            data: row,
        };
        let prediction: Prediction = self.post("predict", &request).await?;
        debug!(
            model_id,
            prediction = prediction.prediction,
            confidence = prediction.confidence,
            "prediction received"
        );
        Ok(prediction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let client = MlServiceClient::new("http://localhost:8000/", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("train"), "http://localhost:8000/train");
    }

    #[test]
    fn test_train_request_shape() {
        let rows = vec![Row::from_pairs([("temperature", "72.1"), ("quality", "pass")])];
        let request = TrainRequest {
            dataset_id: DatasetId(7).to_string(),
            training_data: &rows,
            testing_data: &rows[..0],
        };
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["dataset_id"], "7");
        assert_eq!(json["training_data"][0]["quality"], "pass");
        assert_eq!(json["testing_data"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_service_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP
        let client = MlServiceClient::new("http://127.0.0.1:9", Duration::from_millis(500));
        let row = Row::from_pairs([("a", "1")]);

        let err = client.predict("m", &row).await.unwrap_err();
        assert!(matches!(err, EngineError::Service(_)));
        assert!(err.to_string().starts_with("Failed to communicate with ML service"));
    }
}
