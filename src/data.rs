use anyhow::{anyhow, Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

use crate::csv_reader::{self, CsvData};

/// A single result row: ordered `(key, value)` entries.
///
/// Keys keep their encounter order and may repeat; bin extraction depends
/// on both.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    entries: Vec<(String, Value)>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.get_nth(key, 0)
    }

    /// The `n`-th (zero based) value stored under a repeated `key`.
    pub fn get_nth(&self, key: &str, n: usize) -> Option<&Value> {
        self.entries
            .iter()
            .filter(|(k, _)| k == key)
            .nth(n)
            .map(|(_, v)| v)
    }
}

impl<'de> Deserialize<'de> for ResultRow {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = ResultRow;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a result row object")
            }

            fn visit_map<A>(self, mut map: A) -> std::result::Result<ResultRow, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut row = ResultRow::new();
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    row.push(key, value);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

impl Serialize for ResultRow {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// An ordered sequence of rows as returned by one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    pub rows: Vec<ResultRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn first(&self) -> Option<&ResultRow> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build a result set from raw CSV. Numeric cells become JSON numbers,
    /// empty cells become null, everything else stays a string.
    pub fn from_csv(csv: CsvData) -> Self {
        let rows = csv
            .rows
            .into_iter()
            .map(|cells| {
                let mut row = ResultRow::new();
                for (header, cell) in csv.headers.iter().zip(cells) {
                    row.push(header.clone(), cell_to_value(cell));
                }
                row
            })
            .collect();
        Self { rows }
    }

    /// Create a ResultSet from a JSON array of objects, or an object with a
    /// `data` array.
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = match value {
            Value::Array(_) => value,
            Value::Object(obj) => obj
                .get("data")
                .ok_or_else(|| anyhow!("Result object has no 'data' field"))?,
            _ => return Err(anyhow!("Result set must be a JSON array of objects")),
        };
        if !array.as_array().map_or(false, |items| items.iter().all(Value::is_object)) {
            return Err(anyhow!("Items in result set must be objects"));
        }
        ResultSet::deserialize(array).context("Failed to decode result rows")
    }

    /// Load a result set from a `.csv` or `.json` file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let is_csv = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv {
            let csv = csv_reader::parse_csv(&text)
                .with_context(|| format!("Failed to parse CSV {}", path.display()))?;
            Ok(Self::from_csv(csv))
        } else {
            let value: Value = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse JSON {}", path.display()))?;
            Self::from_json(&value)
        }
    }
}

fn cell_to_value(cell: String) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    match cell.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(cell),
    }
}

/// The fetched result sets in query order: main first, spec second.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueriesData {
    pub main: ResultSet,
    pub spec: Option<ResultSet>,
}

impl QueriesData {
    pub fn new(main: ResultSet, spec: Option<ResultSet>) -> Self {
        Self { main, spec }
    }

    /// Parse a `[{"data": [...]}, {"data": [...]}]` payload.
    pub fn from_json(value: &Value) -> Result<Self> {
        let queries = value
            .as_array()
            .ok_or_else(|| anyhow!("Queries data must be a JSON array"))?;
        let mut sets = queries
            .iter()
            .enumerate()
            .map(|(i, q)| ResultSet::from_json(q).with_context(|| format!("Query {} is invalid", i)));

        let main = sets.next().unwrap_or_else(|| Ok(ResultSet::default()))?;
        let spec = sets.next().transpose()?;
        Ok(Self { main, spec })
    }

    /// The row carrying the threshold scalars: the first spec row when a
    /// spec query ran, otherwise the first main row.
    pub fn threshold_row(&self) -> Option<&ResultRow> {
        match &self.spec {
            Some(spec) => spec.first(),
            None => self.main.first(),
        }
    }

    pub fn has_spec(&self) -> bool {
        self.spec.is_some()
    }
}
