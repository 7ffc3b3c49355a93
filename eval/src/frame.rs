// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Tabular data: cell values and a small column-major frame
//!
//! Labels, sensitive values and features are all [`Value`]s so that class
//! values and group memberships compare by exact equality regardless of
//! whether a dataset stores them as numbers or strings.

use crate::error::{FairnessError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{Read, Write};
use std::path::Path;

/// A single cell: numeric or categorical
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Num(f64),
    Text(String),
}

impl Value {
    /// Parse a CSV cell, treating anything that reads as a number as numeric
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let looks_numeric = trimmed
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
        if looks_numeric {
            if let Ok(v) = trimmed.parse::<f64>() {
                return Value::Num(v);
            }
        }
        Value::Text(trimmed.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Num(v) => Some(*v),
            Value::Text(_) => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Num(_))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Num(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Num(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

// Numbers order before text; numbers use the IEEE total order so that
// equality, hashing and ordering agree.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Num(a), Value::Num(b)) => a.total_cmp(b),
            (Value::Num(_), Value::Text(_)) => Ordering::Less,
            (Value::Text(_), Value::Num(_)) => Ordering::Greater,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Num(v) => {
                0u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

/// Column-major table with named columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    n_rows: usize,
}

impl Frame {
    /// Build from named columns; every column must have the same length
    pub fn new(columns: Vec<String>, data: Vec<Vec<Value>>) -> Result<Self> {
        if columns.len() != data.len() {
            return Err(FairnessError::shape_mismatch("frame columns", columns.len(), data.len()));
        }
        let mut seen = HashSet::new();
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(FairnessError::InvalidDataset(format!("duplicate column '{}'", name)));
            }
        }
        let n_rows = data.first().map_or(0, Vec::len);
        for (name, column) in columns.iter().zip(&data) {
            if column.len() != n_rows {
                return Err(FairnessError::shape_mismatch(
                    format!("column '{}'", name),
                    n_rows,
                    column.len(),
                ));
            }
        }
        Ok(Self { columns, data, n_rows })
    }

    /// Build from row-major records
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut data: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); columns.len()];
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(FairnessError::shape_mismatch(
                    format!("row {}", idx),
                    columns.len(),
                    row.len(),
                ));
            }
            for (column, value) in data.iter_mut().zip(row) {
                column.push(value);
            }
        }
        Self::new(columns, data)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Result<&[Value]> {
        self.column_index(name)
            .map(|idx| self.data[idx].as_slice())
            .ok_or_else(|| FairnessError::MissingAttribute(name.to_string()))
    }

    /// Sorted distinct values of a column
    pub fn unique_values(&self, name: &str) -> Result<Vec<Value>> {
        let mut values = self.column(name)?.to_vec();
        values.sort();
        values.dedup();
        Ok(values)
    }

    /// New frame holding the given rows, in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        let data = self
            .data
            .iter()
            .map(|column| indices.iter().map(|&i| column[i].clone()).collect())
            .collect();
        Frame {
            columns: self.columns.clone(),
            data,
            n_rows: indices.len(),
        }
    }

    /// New frame without the named columns; unknown names are ignored
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Frame {
        let drop: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        let (columns, data): (Vec<String>, Vec<Vec<Value>>) = self
            .columns
            .iter()
            .zip(&self.data)
            .filter(|(name, _)| !drop.contains(name.as_str()))
            .map(|(name, column)| (name.clone(), column.clone()))
            .unzip();
        Frame {
            columns,
            data,
            n_rows: self.n_rows,
        }
    }

    /// Append a column, replacing any existing column of the same name
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Result<Frame> {
        if !self.columns.is_empty() && values.len() != self.n_rows {
            return Err(FairnessError::shape_mismatch(
                format!("column '{}'", name),
                self.n_rows,
                values.len(),
            ));
        }
        self.n_rows = values.len();
        match self.column_index(name) {
            Some(idx) => self.data[idx] = values,
            None => {
                self.columns.push(name.to_string());
                self.data.push(values);
            }
        }
        Ok(self)
    }

    /// Row-major numeric matrix; fails on the first non-numeric column
    pub fn numeric_rows(&self) -> Result<Vec<Vec<f64>>> {
        let mut rows = vec![Vec::with_capacity(self.columns.len()); self.n_rows];
        for (name, column) in self.columns.iter().zip(&self.data) {
            for (row, value) in rows.iter_mut().zip(column) {
                let v = value
                    .as_f64()
                    .ok_or_else(|| FairnessError::NonNumeric { column: name.clone() })?;
                row.push(v);
            }
        }
        Ok(rows)
    }

    /// Whether every cell of a column is numeric
    pub fn is_numeric_column(&self, name: &str) -> Result<bool> {
        Ok(self.column(name)?.iter().all(Value::is_numeric))
    }

    /// Read a headed CSV file
    pub fn read_csv(path: &Path) -> Result<Frame> {
        let file = std::fs::File::open(path)?;
        Self::read_csv_from(file)
    }

    pub fn read_csv_from<R: Read>(reader: R) -> Result<Frame> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(Value::parse).collect());
        }
        Self::from_rows(columns, rows)
    }

    /// Write a headed CSV file
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv_to(file)
    }

    pub fn write_csv_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in 0..self.n_rows {
            writer.write_record(self.data.iter().map(|column| column[row].to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::from_rows(
            vec!["age".into(), "sex".into(), "credit".into()],
            vec![
                vec![Value::Num(30.0), "male".into(), "good".into()],
                vec![Value::Num(22.0), "female".into(), "bad".into()],
                vec![Value::Num(45.0), "female".into(), "good".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_value_parse_and_display() {
        assert_eq!(Value::parse("1"), Value::Num(1.0));
        assert_eq!(Value::parse(" 2.5 "), Value::Num(2.5));
        assert_eq!(Value::parse("male"), Value::Text("male".into()));
        assert_eq!(Value::parse("nan"), Value::Text("nan".into()));
        assert_eq!(Value::Num(1.0).to_string(), "1");
        assert_eq!(Value::Num(0.05).to_string(), "0.05");
    }

    #[test]
    fn test_value_ordering_numbers_first() {
        let mut values =
            vec![Value::from("b"), Value::Num(2.0), Value::from("a"), Value::Num(-1.0)];
        values.sort();
        assert_eq!(
            values,
            vec![Value::Num(-1.0), Value::Num(2.0), Value::from("a"), Value::from("b")]
        );
        assert_ne!(Value::Num(1.0), Value::from("1"));
    }

    #[test]
    fn test_frame_shape_checks() {
        let err = Frame::new(
            vec!["a".into(), "b".into()],
            vec![vec![Value::Num(1.0)], vec![]],
        )
        .unwrap_err();
        assert_eq!(err.code(), "shape_mismatch");

        let dup = Frame::new(vec!["a".into(), "a".into()], vec![vec![], vec![]]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_select_and_drop() {
        let frame = sample_frame();
        let subset = frame.select_rows(&[2, 0]);
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.column("age").unwrap(), &[Value::Num(45.0), Value::Num(30.0)]);

        let features = frame.drop_columns(&["sex", "credit", "missing"]);
        assert_eq!(features.columns(), &["age".to_string()]);
        assert_eq!(features.numeric_rows().unwrap(), vec![vec![30.0], vec![22.0], vec![45.0]]);
    }

    #[test]
    fn test_numeric_rows_rejects_text() {
        let err = sample_frame().numeric_rows().unwrap_err();
        assert!(matches!(err, FairnessError::NonNumeric { column } if column == "sex"));
    }

    #[test]
    fn test_with_column_and_unique_values() {
        let frame = sample_frame()
            .with_column("preds", vec!["good".into(), "good".into(), "bad".into()])
            .unwrap();
        assert_eq!(frame.n_cols(), 4);
        assert_eq!(
            frame.unique_values("sex").unwrap(),
            vec![Value::from("female"), Value::from("male")]
        );
        assert!(sample_frame().with_column("x", vec![Value::Num(1.0)]).is_err());
    }

    #[test]
    fn test_csv_roundtrip_is_stable() {
        let frame = sample_frame();
        let mut first = Vec::new();
        frame.write_csv_to(&mut first).unwrap();
        let reread = Frame::read_csv_from(first.as_slice()).unwrap();
        assert_eq!(reread, frame);

        let mut second = Vec::new();
        reread.write_csv_to(&mut second).unwrap();
        assert_eq!(first, second);
        assert!(String::from_utf8(first).unwrap().starts_with("age,sex,credit\n30,male,good\n"));
    }
}
