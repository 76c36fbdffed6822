//! Dataset metadata and the request/response shapes that flow through the
//! ingestion and partitioning workflow.

use crate::ingest::table::Row;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Store-assigned dataset identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub i64);

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for DatasetId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// The three temporal phases a dataset is partitioned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Training,
    Testing,
    Simulation,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Training, Phase::Testing, Phase::Simulation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Training => "training",
            Phase::Testing => "testing",
            Phase::Simulation => "simulation",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed interval `[start, end]` over UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }

    pub fn start_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Both bounds on the same calendar day.
    pub fn is_single_day(&self) -> bool {
        self.start.date_naive() == self.end.date_naive()
    }

    /// Upper bound used for membership tests: a single-day range covers the
    /// whole day, through its last representable instant.
    pub fn effective_end(&self) -> DateTime<Utc> {
        if !self.is_single_day() {
            return self.end;
        }
        self.end
            .date_naive()
            .succ_opt()
            .and_then(|next| next.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc() - chrono::Duration::nanoseconds(1))
            .unwrap_or(self.end)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.effective_end()
    }
}

/// Record counts per phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCounts {
    pub training: usize,
    pub testing: usize,
    pub simulation: usize,
}

impl PhaseCounts {
    pub fn get(&self, phase: Phase) -> usize {
        match phase {
            Phase::Training => self.training,
            Phase::Testing => self.testing,
            Phase::Simulation => self.simulation,
        }
    }

    pub fn total(&self) -> usize {
        self.training + self.testing + self.simulation
    }

    pub fn is_all_zero(&self) -> bool {
        self.total() == 0
    }
}

/// Metadata computed at ingestion, before the store assigns an identifier.
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub file_name: String,
    pub file_path: PathBuf,
    pub total_rows: usize,
    pub total_columns: usize,
    pub pass_rate: f64,
    pub earliest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

/// Persisted dataset metadata. Owned by the store; the engine only loads and
/// saves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub file_name: String,
    pub file_path: PathBuf,
    pub total_rows: usize,
    pub total_columns: usize,
    pub pass_rate: f64,
    pub earliest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub uploaded_at: DateTime<Utc>,
    pub training: Option<DateRange>,
    pub testing: Option<DateRange>,
    pub simulation: Option<DateRange>,
    pub training_record_count: Option<usize>,
    pub testing_record_count: Option<usize>,
    pub simulation_record_count: Option<usize>,
    pub model_id: Option<String>,
    pub is_model_trained: bool,
    /// Bumped by the store on every successful save.
    pub version: u64,
}

impl Dataset {
    pub fn range(&self, phase: Phase) -> Option<DateRange> {
        match phase {
            Phase::Training => self.training,
            Phase::Testing => self.testing,
            Phase::Simulation => self.simulation,
        }
    }

    pub fn record_count(&self, phase: Phase) -> Option<usize> {
        match phase {
            Phase::Training => self.training_record_count,
            Phase::Testing => self.testing_record_count,
            Phase::Simulation => self.simulation_record_count,
        }
    }

    /// Record validated ranges and their counts.
    pub fn apply_ranges(&mut self, request: &DateRangeRequest, counts: PhaseCounts) {
        self.training = Some(request.training);
        self.testing = Some(request.testing);
        self.simulation = Some(request.simulation);
        self.training_record_count = Some(counts.training);
        self.testing_record_count = Some(counts.testing);
        self.simulation_record_count = Some(counts.simulation);
    }

    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary {
            dataset_id: self.id,
            file_name: self.file_name.clone(),
            total_rows: self.total_rows,
            total_columns: self.total_columns,
            pass_rate: self.pass_rate,
            earliest_timestamp: self.earliest_timestamp,
            latest_timestamp: self.latest_timestamp,
        }
    }
}

/// What ingestion and dataset lookups report back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset_id: DatasetId,
    pub file_name: String,
    pub total_rows: usize,
    pub total_columns: usize,
    pub pass_rate: f64,
    pub earliest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRangeRequest {
    pub dataset_id: DatasetId,
    pub training: DateRange,
    pub testing: DateRange,
    pub simulation: DateRange,
}

impl DateRangeRequest {
    pub fn range(&self, phase: Phase) -> DateRange {
        match phase {
            Phase::Training => self.training,
            Phase::Testing => self.testing,
            Phase::Simulation => self.simulation,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRangeResponse {
    pub is_valid: bool,
    pub error_message: Option<String>,
    pub counts: PhaseCounts,
    /// Phases are not in training -> testing -> simulation order (tolerated).
    pub out_of_sequence: bool,
    /// Requested ranges reach past the observed data span (tolerated).
    pub outside_observed_span: bool,
    /// Counts come from the 70/15/15 positional split.
    pub positional_fallback: bool,
}

impl DateRangeResponse {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// A row prepared for externally paced playback against the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRow {
    pub row_index: usize,
    pub timestamp: DateTime<Utc>,
    pub prediction: Option<u8>,
    pub confidence: Option<f64>,
    pub data: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStep {
    pub row: SimulationRow,
    pub is_completed: bool,
}
