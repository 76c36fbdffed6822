//! Dataset workflow: upload, range validation, partition reads, training and
//! simulation steps.
//!
//! Metadata lives in the [`DatasetStore`]; parsed tables are cached per
//! dataset and keyed by source path so a re-ingest never serves stale rows.
//! The cache holds a bounded number of tables and drops the least recently
//! used one first.

use crate::error::{EngineError, EngineResult};
use crate::ingest::{ingest_file, Row, Table};
use crate::ml::{PredictionService, TrainingReport};
use crate::models::{
    Dataset, DatasetId, DatasetSummary, DateRange, DateRangeRequest, DateRangeResponse,
    NewDataset, Phase, SimulationRow, SimulationStep,
};
use crate::partition::{materialize, PartitionMode, Partitioner, RangeValidator};
use crate::store::DatasetStore;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Parsed tables kept in memory at once.
pub const DEFAULT_TABLE_CACHE_CAPACITY: usize = 8;

struct CachedTable {
    path: PathBuf,
    table: Arc<Table>,
    last_used: AtomicU64,
}

pub struct DatasetService {
    store: Arc<dyn DatasetStore>,
    uploads_dir: PathBuf,
    tables: RwLock<HashMap<DatasetId, CachedTable>>,
    cache_capacity: usize,
    cache_clock: AtomicU64,
}

impl DatasetService {
    pub fn new(store: Arc<dyn DatasetStore>, uploads_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            uploads_dir: uploads_dir.into(),
            tables: RwLock::new(HashMap::new()),
            cache_capacity: DEFAULT_TABLE_CACHE_CAPACITY,
            cache_clock: AtomicU64::new(0),
        }
    }

    /// Keep at most `capacity` parsed tables; the least recently used is
    /// evicted first. Zero disables caching.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Store an uploaded CSV under the uploads directory and ingest it.
    pub fn ingest_upload(&self, file_name: &str, bytes: &[u8]) -> EngineResult<DatasetSummary> {
        if bytes.is_empty() {
            return Err(EngineError::InvalidUpload("File is required".into()));
        }
        // Keep only the final path component of client-supplied names
        let file_name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if !file_name.to_lowercase().ends_with(".csv") {
            return Err(EngineError::InvalidUpload(
                "Only CSV files are supported".into(),
            ));
        }

        std::fs::create_dir_all(&self.uploads_dir)?;
        let path = self
            .uploads_dir
            .join(format!("{}_{}", Uuid::new_v4(), file_name));
        std::fs::write(&path, bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "upload stored");

        let ingested = ingest_file(&path, Utc::now()).and_then(|outcome| {
            let dataset = self.store.create(NewDataset {
                file_name: file_name.to_string(),
                file_path: path.clone(),
                total_rows: outcome.metrics.total_rows,
                total_columns: outcome.metrics.total_columns,
                pass_rate: outcome.metrics.pass_rate,
                earliest_timestamp: outcome.metrics.earliest_timestamp,
                latest_timestamp: outcome.metrics.latest_timestamp,
            })?;
            Ok((dataset, outcome.table))
        });
        let (dataset, table) = match ingested {
            Ok(ingested) => ingested,
            Err(e) => {
                // No record points at the copy, so it must not outlive the failure
                if let Err(rm) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %rm, "failed to remove rejected upload");
                }
                return Err(e);
            }
        };

        self.invalidate(dataset.id);
        self.cache_table(dataset.id, path, Arc::new(table));

        info!(
            dataset_id = %dataset.id,
            file = %dataset.file_name,
            rows = dataset.total_rows,
            columns = dataset.total_columns,
            "dataset ingested"
        );
        Ok(dataset.summary())
    }

    pub fn summary(&self, id: DatasetId) -> EngineResult<DatasetSummary> {
        Ok(self.store.load(id)?.summary())
    }

    pub fn dataset(&self, id: DatasetId) -> EngineResult<Dataset> {
        self.store.load(id)
    }

    /// Drop the cached table for `id`.
    pub fn invalidate(&self, id: DatasetId) {
        self.tables.write().remove(&id);
    }

    /// Number of parsed tables currently held in memory.
    pub fn cached_tables(&self) -> usize {
        self.tables.read().len()
    }

    fn tick(&self) -> u64 {
        self.cache_clock.fetch_add(1, Ordering::Relaxed)
    }

    fn cache_table(&self, id: DatasetId, path: PathBuf, table: Arc<Table>) {
        if self.cache_capacity == 0 {
            return;
        }

        let mut tables = self.tables.write();
        if !tables.contains_key(&id) {
            while tables.len() >= self.cache_capacity {
                let oldest = tables
                    .iter()
                    .min_by_key(|(_, cached)| cached.last_used.load(Ordering::Relaxed))
                    .map(|(id, _)| *id);
                match oldest {
                    Some(oldest) => {
                        tables.remove(&oldest);
                        debug!(dataset_id = %oldest, "evicted cached table");
                    }
                    None => break,
                }
            }
        }
        tables.insert(
            id,
            CachedTable {
                path,
                table,
                last_used: AtomicU64::new(self.tick()),
            },
        );
    }

    fn table(&self, dataset: &Dataset) -> EngineResult<Arc<Table>> {
        if let Some(cached) = self.tables.read().get(&dataset.id) {
            if cached.path == dataset.file_path {
                cached.last_used.store(self.tick(), Ordering::Relaxed);
                return Ok(Arc::clone(&cached.table));
            }
        }

        let table = Arc::new(Table::read_path(&dataset.file_path)?);
        debug!(dataset_id = %dataset.id, rows = table.len(), "table loaded from source");
        self.cache_table(dataset.id, dataset.file_path.clone(), Arc::clone(&table));
        Ok(table)
    }

    /// Validate the three phase ranges and persist them with their counts.
    ///
    /// Unknown datasets and inverted ranges come back as an invalid response
    /// and leave the stored metadata untouched.
    pub fn validate_date_ranges(
        &self,
        request: &DateRangeRequest,
    ) -> EngineResult<DateRangeResponse> {
        match self.apply_ranges(request) {
            Ok(response) => Ok(response),
            Err(e @ (EngineError::NotFound(_) | EngineError::InvalidRange(_))) => {
                warn!(dataset_id = %request.dataset_id, error = %e, "date range request rejected");
                Ok(DateRangeResponse::invalid(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn apply_ranges(&self, request: &DateRangeRequest) -> EngineResult<DateRangeResponse> {
        let mut dataset = self.store.load(request.dataset_id)?;
        let table = self.table(&dataset)?;
        let partitioner = Partitioner::new(&table);

        let validation = RangeValidator::new(&partitioner).validate(
            request,
            dataset.earliest_timestamp,
            dataset.latest_timestamp,
        )?;

        dataset.apply_ranges(request, validation.counts);
        self.store.save(&dataset)?;

        info!(
            dataset_id = %request.dataset_id,
            training = validation.counts.training,
            testing = validation.counts.testing,
            simulation = validation.counts.simulation,
            positional = validation.positional_fallback,
            "date ranges applied"
        );

        Ok(DateRangeResponse {
            is_valid: true,
            error_message: None,
            counts: validation.counts,
            out_of_sequence: validation.out_of_sequence,
            outside_observed_span: validation.outside_observed_span,
            positional_fallback: validation.positional_fallback,
        })
    }

    fn rows_for(
        &self,
        dataset: &Dataset,
        phase: Option<Phase>,
        range: &DateRange,
    ) -> EngineResult<Vec<Row>> {
        let table = self.table(dataset)?;
        let partitioner = Partitioner::new(&table);
        let mode = PartitionMode::for_dataset(dataset);
        let rows = partitioner.select(mode, phase, range);
        debug!(
            dataset_id = %dataset.id,
            phase = phase.map(|p| p.as_str()).unwrap_or("unspecified"),
            positional = mode.is_positional(),
            rows = rows.len(),
            "partition selected"
        );
        Ok(rows)
    }

    /// Rows of dataset `id` for `[start, end]`, optionally naming the phase
    /// being requested.
    pub fn data_for_range(
        &self,
        id: DatasetId,
        phase: Option<Phase>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> EngineResult<Vec<Row>> {
        let dataset = self.store.load(id)?;
        self.rows_for(&dataset, phase, &DateRange::new(start, end))
    }

    fn phase_rows(&self, dataset: &Dataset, phase: Phase) -> EngineResult<Vec<Row>> {
        match dataset.range(phase) {
            Some(range) => self.rows_for(dataset, Some(phase), &range),
            None => Ok(Vec::new()),
        }
    }

    /// Playback rows for the persisted simulation range; empty when unset.
    pub fn simulation_rows(&self, id: DatasetId) -> EngineResult<Vec<SimulationRow>> {
        let dataset = self.store.load(id)?;
        Ok(materialize(self.phase_rows(&dataset, Phase::Simulation)?))
    }

    /// Send the training and testing partitions to `ml` and record the model.
    pub async fn train_model(
        &self,
        id: DatasetId,
        ml: &dyn PredictionService,
    ) -> EngineResult<TrainingReport> {
        let dataset = self.store.load(id)?;
        if dataset.training.is_none() || dataset.testing.is_none() {
            return Err(EngineError::Precondition(
                "Date ranges must be set before training".into(),
            ));
        }

        let training = self.phase_rows(&dataset, Phase::Training)?;
        let testing = self.phase_rows(&dataset, Phase::Testing)?;
        if training.is_empty() || testing.is_empty() {
            return Err(EngineError::Precondition(
                "Insufficient data for training".into(),
            ));
        }

        info!(
            dataset_id = %id,
            training = training.len(),
            testing = testing.len(),
            "submitting partitions for training"
        );
        let report = ml.train(&training, &testing, id).await?;

        // Reload so the version check covers only this write
        let mut dataset = self.store.load(id)?;
        dataset.model_id = Some(report.model_id.clone());
        dataset.is_model_trained = true;
        self.store.save(&dataset)?;

        Ok(report)
    }

    /// Submit one playback row for prediction.
    pub async fn simulate_step(
        &self,
        id: DatasetId,
        row: SimulationRow,
        ml: &dyn PredictionService,
    ) -> EngineResult<SimulationStep> {
        let dataset = self.store.load(id)?;
        let model_id = match (&dataset.model_id, dataset.is_model_trained) {
            (Some(model_id), true) => model_id.clone(),
            _ => {
                return Err(EngineError::Precondition(
                    "Model must be trained first".into(),
                ))
            }
        };

        // Completion follows the playback partition itself; the persisted
        // count can come from a different selection mode
        let playback_len = self.phase_rows(&dataset, Phase::Simulation)?.len();

        let prediction = ml.predict(&model_id, &row.data).await?;
        let is_completed = row.row_index + 1 >= playback_len;
        debug!(
            dataset_id = %id,
            row_index = row.row_index,
            prediction = prediction.prediction,
            is_completed,
            "simulation step"
        );

        Ok(SimulationStep {
            row: SimulationRow {
                prediction: Some(prediction.prediction),
                confidence: Some(prediction.confidence),
                ..row
            },
            is_completed,
        })
    }
}
