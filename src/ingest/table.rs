//! In-memory CSV table.
//!
//! A [`Table`] is request-scoped: it is rebuilt from bytes on every read and
//! never mutated in place. The only structural change a table ever sees is an
//! appended column, which produces a new table.

use crate::error::{EngineError, EngineResult};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// One CSV record: column name to raw string value, in header order.
///
/// Rows of the same table share their column list.
#[derive(Clone, PartialEq, Eq)]
pub struct Row {
    columns: Arc<Vec<String>>,
    values: Vec<String>,
}

impl Row {
    /// Build a standalone row from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (columns, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self {
            columns: Arc::new(columns),
            values,
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.values[idx].as_str())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Row, M::Error> {
                let mut pairs: Vec<(String, String)> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, value)) =
                    access.next_entry::<String, serde_json::Value>()?
                {
                    let value = match value {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    pairs.push((column, value));
                }
                Ok(Row::from_pairs(pairs))
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Ordered rows sharing one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Arc<Vec<String>>,
    rows: Vec<Row>,
}

impl Table {
    /// Parse comma-delimited UTF-8 text with a mandatory header row.
    ///
    /// Short records are padded with empty strings; fields beyond the header
    /// width are dropped.
    pub fn parse(bytes: &[u8]) -> EngineResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(EngineError::Format("CSV headers not found".into()));
        }

        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(EngineError::Format(format!(
                    "duplicate column name '{}'",
                    header
                )));
            }
        }

        let columns = Arc::new(headers);
        let width = columns.len();
        let mut rows = Vec::new();

        for record in reader.records() {
            let record = record?;
            let mut values: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            values.resize(width, String::new());
            rows.push(Row {
                columns: Arc::clone(&columns),
                values,
            });
        }

        Ok(Self { columns, rows })
    }

    pub fn read_path(path: &Path) -> EngineResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Table with a header and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns: Arc::new(columns),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// New table with `name` appended as the last column.
    ///
    /// `values` must hold exactly one entry per row.
    pub fn with_column(&self, name: &str, values: Vec<String>) -> EngineResult<Self> {
        if values.len() != self.rows.len() {
            return Err(EngineError::Format(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        let mut columns = (*self.columns).clone();
        columns.push(name.to_string());
        let columns = Arc::new(columns);

        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| {
                let mut row_values = row.values.clone();
                row_values.push(value);
                Row {
                    columns: Arc::clone(&columns),
                    values: row_values,
                }
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn to_csv_bytes(&self) -> EngineResult<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.iter())?;
        for row in &self.rows {
            writer.write_record(row.values.iter())?;
        }
        writer
            .into_inner()
            .map_err(|e| EngineError::Io(e.into_error()))
    }

    /// Overwrite `path` with this table. Written to a sibling temp file first
    /// and renamed so readers never observe a half-written file.
    pub fn write_path(&self, path: &Path) -> EngineResult<()> {
        let bytes = self.to_csv_bytes()?;
        let tmp = path.with_extension("csv.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
