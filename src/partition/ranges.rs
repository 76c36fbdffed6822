//! Validation of a training/testing/simulation date-range request.
//!
//! Only per-range ordering is enforced. Phase sequencing and coverage of the
//! observed data span are reported but tolerated.

use super::splitter::{Partitioner, PositionalSplit};
use crate::error::{EngineError, EngineResult};
use crate::models::{DateRangeRequest, Phase, PhaseCounts};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValidation {
    pub counts: PhaseCounts,
    pub positional_fallback: bool,
    pub out_of_sequence: bool,
    pub outside_observed_span: bool,
}

/// Each range must satisfy `start <= end`.
pub fn check_ordering(request: &DateRangeRequest) -> EngineResult<()> {
    for phase in Phase::ALL {
        if !request.range(phase).is_ordered() {
            return Err(EngineError::InvalidRange(
                "start date must be before end date".into(),
            ));
        }
    }
    Ok(())
}

/// Training must end before testing starts, testing before simulation.
pub fn is_out_of_sequence(request: &DateRangeRequest) -> bool {
    request.training.end > request.testing.start || request.testing.end > request.simulation.start
}

/// Any requested range reaches before the earliest or after the latest
/// observed timestamp. Unknown span counts as not outside.
pub fn is_outside_span(
    request: &DateRangeRequest,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
) -> bool {
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => Phase::ALL.iter().any(|phase| {
            let range = request.range(*phase);
            range.start < earliest || range.effective_end() > latest
        }),
        _ => false,
    }
}

pub struct RangeValidator<'a> {
    partitioner: &'a Partitioner<'a>,
}

impl<'a> RangeValidator<'a> {
    pub fn new(partitioner: &'a Partitioner<'a>) -> Self {
        Self { partitioner }
    }

    /// Validate `request` and compute the per-phase record counts.
    ///
    /// Counts come from timestamp filtering; if every phase comes back empty
    /// the positional 70/15/15 split supplies them instead.
    pub fn validate(
        &self,
        request: &DateRangeRequest,
        earliest: Option<DateTime<Utc>>,
        latest: Option<DateTime<Utc>>,
    ) -> EngineResult<RangeValidation> {
        check_ordering(request)?;

        let out_of_sequence = is_out_of_sequence(request);
        if out_of_sequence {
            warn!(
                dataset_id = %request.dataset_id,
                "phase ranges overlap or are out of sequence; continuing"
            );
        }

        let outside_observed_span = is_outside_span(request, earliest, latest);
        if outside_observed_span {
            debug!(
                dataset_id = %request.dataset_id,
                "requested ranges extend past the observed data span"
            );
        }

        let mut counts = self.partitioner.counts_by_timestamp([
            &request.training,
            &request.testing,
            &request.simulation,
        ]);

        let positional_fallback = counts.is_all_zero();
        if positional_fallback {
            counts = self.partitioner.positional_split().counts();
            debug!(
                dataset_id = %request.dataset_id,
                training = counts.training,
                testing = counts.testing,
                simulation = counts.simulation,
                "no rows matched any range; using positional split"
            );
        }

        Ok(RangeValidation {
            counts,
            positional_fallback,
            out_of_sequence,
            outside_observed_span,
        })
    }
}

/// Counts the positional split yields for `total` rows.
pub fn positional_counts(total: usize) -> PhaseCounts {
    PositionalSplit::for_len(total).counts()
}
