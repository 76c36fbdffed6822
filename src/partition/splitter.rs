//! Row selection for the three phases.
//!
//! Two modes, chosen per dataset:
//! - timestamp filter: rows whose time value falls inside the requested range
//! - positional fallback: a fixed 70/15/15 split by row position, used when
//!   the persisted phase starts all share one calendar day

use crate::ingest::{find_timestamp_column, parse_instant, Row, Table, SYNTHETIC_TIMESTAMP_COLUMN};
use crate::models::{Dataset, DateRange, Phase, PhaseCounts};
use chrono::NaiveDate;
use std::ops::Range;

const TRAINING_PERCENT: usize = 70;
const TESTING_PERCENT: usize = 15;

/// Row index ranges of the positional split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionalSplit {
    pub training: Range<usize>,
    pub testing: Range<usize>,
    pub simulation: Range<usize>,
}

impl PositionalSplit {
    /// First 70% (floor), next 15% (floor), remainder.
    pub fn for_len(total: usize) -> Self {
        let training_len = total * TRAINING_PERCENT / 100;
        let testing_len = total * TESTING_PERCENT / 100;
        let testing_end = training_len + testing_len;
        Self {
            training: 0..training_len,
            testing: training_len..testing_end,
            simulation: testing_end..total,
        }
    }

    pub fn range(&self, phase: Phase) -> Range<usize> {
        match phase {
            Phase::Training => self.training.clone(),
            Phase::Testing => self.testing.clone(),
            Phase::Simulation => self.simulation.clone(),
        }
    }

    pub fn counts(&self) -> PhaseCounts {
        PhaseCounts {
            training: self.training.len(),
            testing: self.testing.len(),
            simulation: self.simulation.len(),
        }
    }
}

/// Calendar days of the three persisted phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseStarts {
    pub training: NaiveDate,
    pub testing: NaiveDate,
    pub simulation: NaiveDate,
}

impl PhaseStarts {
    /// Phase whose start day equals `day`, checked training, testing, simulation.
    pub fn matching(&self, day: NaiveDate) -> Option<Phase> {
        if day == self.training {
            Some(Phase::Training)
        } else if day == self.testing {
            Some(Phase::Testing)
        } else if day == self.simulation {
            Some(Phase::Simulation)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionMode {
    TimestampFilter,
    Positional(PhaseStarts),
}

impl PartitionMode {
    /// Positional when all three persisted starts fall on one calendar day,
    /// timestamp filter otherwise (including when ranges are unset).
    pub fn for_dataset(dataset: &Dataset) -> Self {
        match (dataset.training, dataset.testing, dataset.simulation) {
            (Some(training), Some(testing), Some(simulation)) => {
                let starts = PhaseStarts {
                    training: training.start_day(),
                    testing: testing.start_day(),
                    simulation: simulation.start_day(),
                };
                if starts.training == starts.testing && starts.testing == starts.simulation {
                    PartitionMode::Positional(starts)
                } else {
                    PartitionMode::TimestampFilter
                }
            }
            _ => PartitionMode::TimestampFilter,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, PartitionMode::Positional(_))
    }
}

/// Selects phase rows from one table.
pub struct Partitioner<'a> {
    table: &'a Table,
    timestamp_column: &'a str,
}

impl<'a> Partitioner<'a> {
    pub fn new(table: &'a Table) -> Self {
        let timestamp_column =
            find_timestamp_column(table.columns()).unwrap_or(SYNTHETIC_TIMESTAMP_COLUMN);
        Self {
            table,
            timestamp_column,
        }
    }

    pub fn timestamp_column(&self) -> &str {
        self.timestamp_column
    }

    fn in_range<'r>(&'r self, range: &'r DateRange) -> impl Iterator<Item = &'a Row> + 'r {
        let column = self.timestamp_column;
        self.table.rows().iter().filter(move |row| {
            row.get(column)
                .and_then(parse_instant)
                .map(|ts| range.contains(ts))
                .unwrap_or(false)
        })
    }

    /// Rows whose timestamp lies within `range`, inclusive; unparseable
    /// timestamps are excluded.
    pub fn rows_in_range(&self, range: &DateRange) -> Vec<Row> {
        self.in_range(range).cloned().collect()
    }

    pub fn count_in_range(&self, range: &DateRange) -> usize {
        self.in_range(range).count()
    }

    /// Per-phase counts under timestamp filtering.
    pub fn counts_by_timestamp(&self, ranges: [&DateRange; 3]) -> PhaseCounts {
        let [training, testing, simulation] = ranges;
        PhaseCounts {
            training: self.count_in_range(training),
            testing: self.count_in_range(testing),
            simulation: self.count_in_range(simulation),
        }
    }

    pub fn positional_split(&self) -> PositionalSplit {
        PositionalSplit::for_len(self.table.len())
    }

    pub fn positional_rows(&self, phase: Phase) -> Vec<Row> {
        self.table.rows()[self.positional_split().range(phase)].to_vec()
    }

    /// Rows for a partition request under `mode`.
    ///
    /// In positional mode a known `phase` picks its slice directly. Without
    /// one, the range start day is matched against the persisted phase
    /// starts; an unmatched day yields the whole table.
    pub fn select(&self, mode: PartitionMode, phase: Option<Phase>, range: &DateRange) -> Vec<Row> {
        match mode {
            PartitionMode::TimestampFilter => self.rows_in_range(range),
            PartitionMode::Positional(starts) => {
                match phase.or_else(|| starts.matching(range.start_day())) {
                    Some(phase) => self.positional_rows(phase),
                    None => self.table.rows().to_vec(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::fmt::Write as _;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    /// `n` rows, one per hour from 2024-01-01 00:00.
    fn hourly_table(n: usize) -> Table {
        let mut csv = String::from("timestamp,value\n");
        let base = utc(2024, 1, 1);
        for i in 0..n {
            let ts = base + Duration::hours(i as i64);
            writeln!(csv, "{},{}", ts.format("%Y-%m-%d %H:%M:%S"), i).unwrap();
        }
        Table::parse(csv.as_bytes()).unwrap()
    }

    fn values(rows: &[Row]) -> Vec<usize> {
        rows.iter()
            .map(|r| r.get("value").unwrap().parse().unwrap())
            .collect()
    }

    #[test]
    fn test_positional_split_sizes() {
        assert_eq!(PositionalSplit::for_len(100).counts(), PhaseCounts {
            training: 70,
            testing: 15,
            simulation: 15,
        });
        assert_eq!(PositionalSplit::for_len(10).counts(), PhaseCounts {
            training: 7,
            testing: 1,
            simulation: 2,
        });
        assert_eq!(PositionalSplit::for_len(0).counts(), PhaseCounts::default());
    }

    #[test]
    fn test_positional_split_is_disjoint_and_ordered() {
        for n in [0usize, 1, 2, 3, 7, 19, 20, 33, 60, 99, 100, 1001] {
            let split = PositionalSplit::for_len(n);
            assert_eq!(split.training.start, 0);
            assert_eq!(split.training.end, split.testing.start);
            assert_eq!(split.testing.end, split.simulation.start);
            assert_eq!(split.simulation.end, n);
            assert_eq!(split.counts().total(), n);
        }
    }

    #[test]
    fn test_single_day_filter_returns_whole_day() {
        // 48 hourly rows spanning 2024-01-01 and 2024-01-02
        let table = hourly_table(48);
        let partitioner = Partitioner::new(&table);
        let day = DateRange::new(utc(2024, 1, 2), utc(2024, 1, 2));

        let rows = partitioner.rows_in_range(&day);
        assert_eq!(rows.len(), 24);
        assert_eq!(values(&rows), (24..48).collect::<Vec<_>>());
    }

    #[test]
    fn test_filter_is_inclusive_and_skips_bad_timestamps() {
        let table = Table::parse(
            b"timestamp,value\n2024-01-01 00:00:00,0\nbroken,1\n2024-01-03 00:00:00,2\n2024-01-05 00:00:00,3\n",
        )
        .unwrap();
        let partitioner = Partitioner::new(&table);
        let range = DateRange::new(utc(2024, 1, 1), utc(2024, 1, 3));

        assert_eq!(values(&partitioner.rows_in_range(&range)), vec![0, 2]);
        assert_eq!(partitioner.count_in_range(&range), 2);
    }

    #[test]
    fn test_mode_selection() {
        let mut dataset = crate::test_support::dataset_fixture();
        assert_eq!(PartitionMode::for_dataset(&dataset), PartitionMode::TimestampFilter);

        let same = DateRange::new(utc(2024, 1, 1), utc(2024, 1, 1));
        dataset.training = Some(same);
        dataset.testing = Some(same);
        dataset.simulation = Some(same);
        assert!(PartitionMode::for_dataset(&dataset).is_positional());

        dataset.simulation = Some(DateRange::new(utc(2024, 1, 2), utc(2024, 1, 3)));
        assert_eq!(PartitionMode::for_dataset(&dataset), PartitionMode::TimestampFilter);
    }

    #[test]
    fn test_positional_select_by_phase_and_fallback() {
        let table = hourly_table(20);
        let partitioner = Partitioner::new(&table);
        let day = utc(2024, 1, 1).date_naive();
        let mode = PartitionMode::Positional(PhaseStarts {
            training: day,
            testing: day,
            simulation: day,
        });
        let same_day = DateRange::new(utc(2024, 1, 1), utc(2024, 1, 1));

        let training = partitioner.select(mode, Some(Phase::Training), &same_day);
        let testing = partitioner.select(mode, Some(Phase::Testing), &same_day);
        let simulation = partitioner.select(mode, Some(Phase::Simulation), &same_day);
        assert_eq!(values(&training), (0..14).collect::<Vec<_>>());
        assert_eq!(values(&testing), (14..17).collect::<Vec<_>>());
        assert_eq!(values(&simulation), (17..20).collect::<Vec<_>>());

        // No hint: the start day matches training first
        assert_eq!(partitioner.select(mode, None, &same_day).len(), 14);

        // Unmatched day returns the whole table
        let other = DateRange::new(utc(2025, 5, 5), utc(2025, 5, 6));
        assert_eq!(partitioner.select(mode, None, &other).len(), 20);
    }
}
