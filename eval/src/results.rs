// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Result rows, result files and per-unit audit artifacts
//!
//! A result file starts with `algorithm,params,run-id,<metric names...>`
//! and receives one line per unit of work:
//!
//! ```text
//! SVM,"C=1;kernel=linear",0,0.74,0.81,...
//! ```
//!
//! The params field is always quoted; a metric without a value is an empty
//! field. Rows are appended and never rewritten.

use crate::error::{ensure_len, FairnessError, Result};
use crate::frame::{Frame, Value};
use crate::params::ParamSet;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One row of a result file
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub algorithm: String,
    pub params: ParamSet,
    pub run_id: usize,
    pub values: Vec<Option<f64>>,
}

impl ResultRow {
    /// Render as a single line without the trailing newline
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{},\"{}\",{}",
            csv_field(&self.algorithm),
            self.params.to_field().replace('"', "\"\""),
            self.run_id
        );
        for value in &self.values {
            line.push(',');
            if let Some(v) = value {
                line.push_str(&v.to_string());
            }
        }
        line
    }

    /// Parse a line produced by [`ResultRow::to_line`]
    pub fn parse(line: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(line.as_bytes());
        let record = reader
            .records()
            .next()
            .ok_or_else(|| FairnessError::InvalidDataset("empty result row".to_string()))??;
        if record.len() < 3 {
            return Err(FairnessError::shape_mismatch("result row fields", 3, record.len()));
        }

        let run_id = record[2]
            .parse()
            .map_err(|_| FairnessError::InvalidDataset(format!("bad run id '{}'", &record[2])))?;
        let values = record
            .iter()
            .skip(3)
            .map(|field| match field.trim() {
                "" => Ok(None),
                v => v.parse::<f64>().map(Some).map_err(|_| {
                    FairnessError::InvalidDataset(format!("bad metric value '{}'", v))
                }),
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            algorithm: record[0].to_string(),
            params: ParamSet::parse(&record[1])?,
            run_id,
            values,
        })
    }
}

/// Quote a field only when it holds a delimiter, quote or line break
fn csv_field(text: &str) -> Cow<'_, str> {
    if text.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(text)
    }
}

pub fn header_line(metric_names: &[String]) -> String {
    let mut header = String::from("algorithm,params,run-id");
    for name in metric_names {
        header.push(',');
        header.push_str(&csv_field(name));
    }
    header
}

/// Append-only result file for one (attribute, tag) or (attribute, tag, algorithm)
pub struct ResultsFile {
    path: PathBuf,
    writer: BufWriter<File>,
    metric_names: Vec<String>,
    rows: usize,
}

impl ResultsFile {
    /// Create (truncating) the file and write the header
    pub fn create(path: &Path, metric_names: Vec<String>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{}", header_line(&metric_names))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            metric_names,
            rows: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    /// Append one row; its values must line up with the header
    pub fn write_row(&mut self, row: &ResultRow) -> Result<()> {
        ensure_len("result row values", self.metric_names.len(), row.values.len())?;
        writeln!(self.writer, "{}", row.to_line())?;
        self.rows += 1;
        Ok(())
    }

    /// Flush and close, returning the path written
    pub fn close(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

/// Train/test frames of one unit of work, predictions attached to test
pub struct AuditUnit<'a> {
    pub dataset: &'a str,
    pub attribute: &'a str,
    pub tag: &'a str,
    pub algorithm: &'a str,
    pub params: &'a ParamSet,
    pub trial: usize,
    pub train: &'a Frame,
    pub test: &'a Frame,
    pub predictions: &'a [Value],
}

impl AuditUnit<'_> {
    /// `<dataset>_<attribute>_<tag>_<algorithm>_[<params>_]<trial>`
    pub fn file_stem(&self) -> String {
        let mut stem = format!(
            "{}_{}_{}_{}_",
            self.dataset, self.attribute, self.tag, self.algorithm
        );
        if !self.params.is_empty() {
            stem.push_str(&self.params.to_field());
            stem.push('_');
        }
        stem.push_str(&self.trial.to_string());
        stem
    }
}

/// Writes the frames behind every unit of work for later inspection
#[derive(Debug, Clone)]
pub struct AuditWriter {
    dir: PathBuf,
}

impl AuditWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<stem>_train.csv` and `<stem>_test.csv` (the latter with a
    /// `preds` column) and return both paths
    pub fn write(&self, unit: &AuditUnit<'_>) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(&self.dir)?;
        let stem = unit.file_stem();
        let train_path = self.dir.join(format!("{}_train.csv", stem));
        let test_path = self.dir.join(format!("{}_test.csv", stem));

        unit.train.write_csv(&train_path)?;
        unit.test
            .clone()
            .with_column("preds", unit.predictions.to_vec())?
            .write_csv(&test_path)?;

        tracing::debug!("Audit frames written to {}", test_path.display());
        Ok((train_path, test_path))
    }
}
