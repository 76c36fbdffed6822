//! Dataset-level figures derived from an inferred table.

use super::table::Table;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const PASS_TOKENS: [&str; 5] = ["pass", "1", "true", "good", "yes"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a raw cell as a UTC instant.
///
/// Accepts RFC 3339 and the common naive date/time layouts; naive values are
/// taken as UTC. Returns `None` for anything else.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    None
}

/// Whether a target cell counts as a pass.
pub fn is_pass_value(raw: &str) -> bool {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
    let lowered = trimmed.to_lowercase();
    PASS_TOKENS.contains(&lowered.as_str())
}

/// Fraction of rows whose target value is a pass token.
///
/// 0.0 for an empty table or an empty target column name.
pub fn pass_rate(table: &Table, target_column: &str) -> f64 {
    if table.is_empty() || target_column.is_empty() {
        return 0.0;
    }

    let passes = table
        .rows()
        .iter()
        .filter(|row| row.get(target_column).map(is_pass_value).unwrap_or(false))
        .count();

    passes as f64 / table.len() as f64
}

/// Earliest and latest parseable instant in `timestamp_column`.
///
/// Unparseable cells are skipped; both ends are `None` if nothing parses.
pub fn timestamp_range(
    table: &Table,
    timestamp_column: &str,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    table
        .rows()
        .iter()
        .filter_map(|row| row.get(timestamp_column).and_then(parse_instant))
        .fold((None, None), |(min, max), ts| {
            (
                Some(min.map_or(ts, |m: DateTime<Utc>| m.min(ts))),
                Some(max.map_or(ts, |m: DateTime<Utc>| m.max(ts))),
            )
        })
}

/// Figures recorded once at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetrics {
    pub total_rows: usize,
    pub total_columns: usize,
    pub target_column: String,
    pub pass_rate: f64,
    pub earliest_timestamp: Option<DateTime<Utc>>,
    pub latest_timestamp: Option<DateTime<Utc>>,
}

impl TableMetrics {
    pub fn compute(table: &Table, target_column: &str, timestamp_column: &str) -> Self {
        let (earliest_timestamp, latest_timestamp) = timestamp_range(table, timestamp_column);
        Self {
            total_rows: table.len(),
            // Column count is taken from the first row, so an empty table reports 0
            total_columns: table.rows().first().map(|row| row.len()).unwrap_or(0),
            target_column: target_column.to_string(),
            pass_rate: pass_rate(table, target_column),
            earliest_timestamp,
            latest_timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pass_rate_quality_column() {
        let table = Table::parse(b"id,quality\n1,pass\n2,fail\n3,pass\n4,pass\n").unwrap();
        assert_eq!(pass_rate(&table, "quality"), 0.75);
    }

    #[test]
    fn test_pass_tokens_are_normalized() {
        assert!(is_pass_value(" PASS "));
        assert!(is_pass_value("Yes,"));
        assert!(is_pass_value("1"));
        assert!(is_pass_value("True"));
        assert!(is_pass_value("good"));
        assert!(!is_pass_value("fail"));
        assert!(!is_pass_value("0"));
        assert!(!is_pass_value("pass,,"));
        assert!(!is_pass_value(""));
    }

    #[test]
    fn test_pass_rate_empty_inputs() {
        let empty = Table::parse(b"quality\n").unwrap();
        assert_eq!(pass_rate(&empty, "quality"), 0.0);

        let table = Table::parse(b"quality\npass\n").unwrap();
        assert_eq!(pass_rate(&table, ""), 0.0);
        assert_eq!(pass_rate(&table, "missing"), 0.0);
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
        assert_eq!(parse_instant("2024-01-15 08:30:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T08:30:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T08:30:00Z"), Some(expected));
        assert_eq!(parse_instant("2024-01-15T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_instant("01/15/2024 08:30:00"), Some(expected));
        assert_eq!(
            parse_instant("2024-01-15"),
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant(""), None);
    }

    #[test]
    fn test_timestamp_range_skips_unparseable() {
        let table = Table::parse(
            b"ts,v\n2024-01-03 00:00:00,1\ngarbage,2\n2024-01-01 00:00:00,3\n2024-01-02 00:00:00,4\n",
        )
        .unwrap();
        let (min, max) = timestamp_range(&table, "ts");

        assert_eq!(min, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        assert_eq!(max, Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_timestamp_range_none_when_nothing_parses() {
        let table = Table::parse(b"ts\nx\ny\n").unwrap();
        assert_eq!(timestamp_range(&table, "ts"), (None, None));
    }

    #[test]
    fn test_metrics_column_count_from_first_row() {
        let table = Table::parse(b"a,b,quality\n1,2,pass\n").unwrap();
        let metrics = TableMetrics::compute(&table, "quality", "timestamp");
        assert_eq!(metrics.total_rows, 1);
        assert_eq!(metrics.total_columns, 3);
        assert_eq!(metrics.pass_rate, 1.0);

        let empty = Table::parse(b"a,b\n").unwrap();
        assert_eq!(TableMetrics::compute(&empty, "b", "a").total_columns, 0);
    }
}
