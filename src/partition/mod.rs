//! Temporal partitioning: range validation, phase row selection and
//! simulation playback rows.

pub mod ranges;
pub mod simulation;
pub mod splitter;

pub use ranges::{check_ordering, RangeValidation, RangeValidator};
pub use simulation::materialize;
pub use splitter::{PartitionMode, Partitioner, PhaseStarts, PositionalSplit};
