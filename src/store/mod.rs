//! Dataset metadata persistence.
//!
//! The engine treats the store as an external collaborator with get/put
//! semantics keyed by [`DatasetId`]. Saves are optimistic: a writer holding a
//! stale `version` is refused with [`EngineError::Conflict`] instead of
//! overwriting a newer record.

pub mod sqlite;

pub use sqlite::SqliteDatasetStore;

use crate::error::EngineResult;
use crate::models::{Dataset, DatasetId, NewDataset};

pub trait DatasetStore: Send + Sync {
    /// Persist freshly ingested metadata; the store assigns the identifier.
    fn create(&self, dataset: NewDataset) -> EngineResult<Dataset>;

    /// Fetch by identifier, [`EngineError::NotFound`] if unknown.
    ///
    /// [`EngineError::NotFound`]: crate::error::EngineError::NotFound
    fn load(&self, id: DatasetId) -> EngineResult<Dataset>;

    /// Write back a modified record. Succeeds only if `dataset.version`
    /// matches the stored version; returns the record with its new version.
    fn save(&self, dataset: &Dataset) -> EngineResult<Dataset>;
}
