//! Canonical tabular input
//!
//! Callers hand the engine a single record, a list of records, a JSON document,
//! a CSV file or a polars `DataFrame`. All of them are converted here into one
//! [`FeatureFrame`] so the rest of the pipeline only ever sees one shape.

use crate::error::{NormalizeError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

/// A raw cell value as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Absent or null
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Free text
    Text(String),
}

impl RawValue {
    /// Whether the value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&Value> for RawValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for RawValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Normalize a column name: trim, drop whitespace, lowercase.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// One subject's raw attributes, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRecord {
    fields: Vec<(String, RawValue)>,
}

impl FeatureRecord {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Append a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Last value supplied under a name (compared after normalization).
    pub fn get(&self, name: &str) -> Option<&RawValue> {
        let wanted = normalize_column_name(name);
        self.fields
            .iter()
            .rev()
            .find(|(key, _)| normalize_column_name(key) == wanted)
            .map(|(_, value)| value)
    }

    /// Fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a record from a JSON object.
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        Self {
            fields: object
                .iter()
                .map(|(k, v)| (k.clone(), RawValue::from(v)))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for FeatureRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Column-major table of raw values with normalized column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    n_rows: usize,
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<RawValue>>,
}

impl FeatureFrame {
    /// A frame with no rows and no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Frame holding a single record.
    pub fn from_record(record: &FeatureRecord) -> Self {
        Self::from_records(std::slice::from_ref(record))
    }

    /// Frame holding several records; keys are unioned and gaps are null.
    pub fn from_records(records: &[FeatureRecord]) -> Self {
        let mut frame = Self::default();
        for record in records {
            frame.push_row(record.iter().map(|(name, value)| (name, value.clone())));
        }
        frame
    }

    /// Frame from a JSON object or an array of objects.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Object(object) => Ok(Self::from_record(&FeatureRecord::from_json_object(
                object,
            ))),
            Value::Array(items) => {
                let records = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Object(object) => Ok(FeatureRecord::from_json_object(object)),
                        other => Err(NormalizeError::InvalidInput(format!(
                            "element {i} is not an object: {other}"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self::from_records(&records))
            }
            other => Err(NormalizeError::InvalidInput(format!(
                "expected an object or an array of objects, got {other}"
            ))),
        }
    }

    /// Frame from CSV with a header row; empty cells are null.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();
        let mut frame = Self::default();
        for row in reader.records() {
            let row = row?;
            frame.push_row(headers.iter().zip(row.iter()).map(|(name, cell)| {
                let value = if cell.is_empty() {
                    RawValue::Null
                } else {
                    RawValue::Text(cell.to_string())
                };
                (name, value)
            }));
        }
        Ok(frame)
    }

    /// Frame from a polars DataFrame, preserving typed cells.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut frame = Self {
            n_rows: df.height(),
            ..Self::default()
        };
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let values: Vec<RawValue> = match series.dtype() {
                DataType::Boolean => series.bool()?.into_iter().map(RawValue::from).collect(),
                DataType::String => series
                    .str()?
                    .into_iter()
                    .map(|v| RawValue::from(v.map(str::to_string)))
                    .collect(),
                dtype if dtype.is_integer() => series
                    .cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(RawValue::from)
                    .collect(),
                dtype if dtype.is_float() => series
                    .cast(&DataType::Float64)?
                    .f64()?
                    .into_iter()
                    .map(RawValue::from)
                    .collect(),
                _ => series
                    .cast(&DataType::String)?
                    .str()?
                    .into_iter()
                    .map(|v| RawValue::from(v.map(str::to_string)))
                    .collect(),
            };
            frame.set_column(column.name().as_str(), values);
        }
        Ok(frame)
    }

    fn set_column(&mut self, raw_name: &str, values: Vec<RawValue>) {
        let name = normalize_column_name(raw_name);
        match self.index.get(&name) {
            Some(&i) => self.columns[i] = values,
            None => {
                self.index.insert(name.clone(), self.names.len());
                self.names.push(name);
                self.columns.push(values);
            }
        }
    }

    fn push_row<S, I>(&mut self, fields: I)
    where
        S: AsRef<str>,
        I: IntoIterator<Item = (S, RawValue)>,
    {
        let row = self.n_rows;
        self.n_rows += 1;
        for column in &mut self.columns {
            column.push(RawValue::Null);
        }
        for (raw_name, value) in fields {
            let name = normalize_column_name(raw_name.as_ref());
            let i = match self.index.get(&name) {
                Some(&i) => i,
                None => {
                    self.index.insert(name.clone(), self.names.len());
                    self.names.push(name);
                    self.columns.push(vec![RawValue::Null; self.n_rows]);
                    self.columns.len() - 1
                }
            };
            self.columns[i][row] = value;
        }
    }

    /// Number of rows.
    pub const fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Normalized column names in first-seen order.
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    /// Values of a column by normalized name.
    pub fn column(&self, name: &str) -> Option<&[RawValue]> {
        self.index
            .get(&normalize_column_name(name))
            .map(|&i| self.columns[i].as_slice())
    }

    /// Whether the frame has no rows.
    pub const fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Row `i` as a record with normalized names.
    pub fn row(&self, i: usize) -> Option<FeatureRecord> {
        (i < self.n_rows).then(|| {
            self.names
                .iter()
                .zip(&self.columns)
                .map(|(name, column)| (name.clone(), column[i].clone()))
                .collect()
        })
    }
}

impl From<FeatureRecord> for FeatureFrame {
    fn from(record: FeatureRecord) -> Self {
        Self::from_record(&record)
    }
}

impl From<Vec<FeatureRecord>> for FeatureFrame {
    fn from(records: Vec<FeatureRecord>) -> Self {
        Self::from_records(&records)
    }
}
