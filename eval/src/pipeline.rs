// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Reproducible fairness benchmark
//!
//! Walks every dataset, sensitive attribute, algorithm, trial and data
//! representation in that order. Each (algorithm, trial, tag) unit runs the
//! algorithm on a pre-split train/test pair, scores the predictions with the
//! expanded metric list for the active attribute and appends one row to the
//! result file of that (attribute, tag). Grid searches also append one row
//! per configuration to an auxiliary file.
//!
//! A unit that fails is logged and skipped: it contributes no rows and the
//! loop moves on. A result file that cannot be opened or written abandons
//! the enclosing (dataset, attribute) scope only.

use crate::algorithms::{Algorithm, AlgorithmRegistry, RunInput};
use crate::datasets::{Dataset, ProcessedData, Split, TAGS};
use crate::error::{ensure_len, FairnessError};
use crate::frame::Value;
use crate::metrics::{EvaluationData, Metric, MetricRegistry};
use crate::results::{AuditUnit, AuditWriter, ResultRow, ResultsFile};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Configuration for a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Train/test splits per dataset
    pub num_trials: usize,
    /// Dataset names to run (empty = all)
    pub datasets: Vec<String>,
    /// Algorithm names to run (empty = all)
    pub algorithms: Vec<String>,
    /// Random seed for reproducibility
    pub seed: u64,
    /// Share of rows that go to the training split
    pub train_fraction: f64,
    /// Directory receiving the result files
    pub results_dir: PathBuf,
    /// Directory receiving the per-unit audit frames
    pub cache_dir: PathBuf,
    /// Whether to write audit frames at all
    pub audit: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            num_trials: 10,
            datasets: vec![],
            algorithms: vec![],
            seed: 42,
            train_fraction: 2.0 / 3.0,
            results_dir: PathBuf::from("results"),
            cache_dir: PathBuf::from("results/train_test_datasets"),
            audit: true,
        }
    }
}

impl BenchmarkConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.train_fraction > 0.0 && self.train_fraction < 1.0,
            "train_fraction must lie in (0, 1), got {}",
            self.train_fraction
        );
        Ok(())
    }
}

/// A unit of work that was skipped, with the cause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedUnit {
    pub dataset: String,
    pub attribute: String,
    pub algorithm: String,
    pub trial: usize,
    pub tag: String,
    pub error: String,
}

/// A dataset or (dataset, attribute) scope that was abandoned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedScope {
    pub dataset: String,
    pub attribute: Option<String>,
    pub error: String,
}

/// What a benchmark run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub config: BenchmarkConfig,
    pub rows_written: usize,
    pub grid_rows_written: usize,
    pub failed_units: Vec<FailedUnit>,
    pub failed_scopes: Vec<FailedScope>,
    pub results_files: Vec<PathBuf>,
    pub unmatched_algorithms: Vec<String>,
    pub unmatched_datasets: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl BenchmarkSummary {
    fn new(config: BenchmarkConfig) -> Self {
        Self {
            config,
            rows_written: 0,
            grid_rows_written: 0,
            failed_units: Vec::new(),
            failed_scopes: Vec::new(),
            results_files: Vec::new(),
            unmatched_algorithms: Vec::new(),
            unmatched_datasets: Vec::new(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Where a unit of work sits in the nested loop
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    pub dataset: &'a Dataset,
    pub attribute: &'a str,
    pub tag: &'static str,
    pub trial: usize,
}

/// Rows computed for one unit, not yet written anywhere
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub primary: ResultRow,
    pub grid: Vec<ResultRow>,
    pub predictions: Vec<Value>,
}

/// Run `algorithm` on one split and score its predictions with `metrics`
pub fn evaluate_unit(
    ctx: &UnitContext<'_>,
    algorithm: &dyn Algorithm,
    split: &Split,
    metrics: &[Arc<dyn Metric>],
) -> crate::error::Result<UnitOutcome> {
    let dataset = ctx.dataset;
    let sensitive = dataset.sensitive_attributes_with_joint();
    let privileged = dataset.privileged_values_with_joint(ctx.tag);
    let positive = dataset.positive_value(ctx.tag);
    let params = algorithm.default_params();

    let input = RunInput {
        train: &split.train,
        test: &split.test,
        class_attribute: dataset.class_attribute(),
        positive_value: &positive,
        sensitive_attributes: &sensitive,
        active_sensitive: ctx.attribute,
        privileged_values: &privileged,
        params: &params,
        trial: ctx.trial,
    };
    let output = algorithm.run(&input)?;

    let data = EvaluationData::from_test_frame(&split.test, dataset.class_attribute(), &sensitive)?;
    let unprotected = privileged.get(ctx.attribute).map(Vec::as_slice).unwrap_or(&[]);
    let score = |predictions: &[Value]| -> crate::error::Result<Vec<Option<f64>>> {
        ensure_len("predictions", data.actual.len(), predictions.len())?;
        let metric_input = data.input(predictions, ctx.attribute, unprotected, &positive);
        metrics
            .iter()
            .map(|metric| {
                let value = metric.calc(&metric_input)?;
                tracing::debug!("{} {}: {:?}", algorithm.name(), metric.name(), value);
                Ok(value)
            })
            .collect()
    };

    let primary = ResultRow {
        algorithm: algorithm.name(),
        params: params.clone(),
        run_id: ctx.trial,
        values: score(&output.predictions[..])?,
    };

    let mut grid = Vec::new();
    if algorithm.reports_grid() {
        for variant in &output.grid {
            grid.push(ResultRow {
                algorithm: algorithm.name(),
                params: variant.params(),
                run_id: ctx.trial,
                values: score(&variant.predictions[..])?,
            });
        }
    }

    Ok(UnitOutcome {
        primary,
        grid,
        predictions: output.predictions,
    })
}

/// A result file plus the metric columns it was opened with
struct TagSink {
    file: ResultsFile,
    metrics: Vec<Arc<dyn Metric>>,
}

/// Main benchmark pipeline
pub struct EvaluationPipeline {
    config: BenchmarkConfig,
    datasets: Vec<Dataset>,
    algorithms: AlgorithmRegistry,
    metrics: MetricRegistry,
}

impl EvaluationPipeline {
    pub fn new(
        config: BenchmarkConfig,
        datasets: Vec<Dataset>,
        algorithms: AlgorithmRegistry,
        metrics: MetricRegistry,
    ) -> Self {
        Self {
            config,
            datasets,
            algorithms,
            metrics,
        }
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Run the full benchmark
    pub fn run(&self) -> Result<BenchmarkSummary> {
        self.config.validate()?;
        let mut summary = BenchmarkSummary::new(self.config.clone());

        let (algorithms, unmatched) = self.algorithms.select(&self.config.algorithms);
        if !unmatched.is_empty() {
            tracing::warn!(
                "No algorithm named {:?}; registered: {}",
                unmatched,
                self.algorithms.names().join(", ")
            );
        }
        summary.unmatched_algorithms = unmatched;

        let dataset_names: Vec<&str> = self.datasets.iter().map(Dataset::name).collect();
        summary.unmatched_datasets = self
            .config
            .datasets
            .iter()
            .filter(|name| !dataset_names.contains(&name.as_str()))
            .cloned()
            .collect();
        if !summary.unmatched_datasets.is_empty() {
            tracing::warn!(
                "No dataset named {:?}; available: {}",
                summary.unmatched_datasets,
                dataset_names.join(", ")
            );
        }

        for dataset in &self.datasets {
            let selected = self.config.datasets.is_empty()
                || self.config.datasets.iter().any(|d| d == dataset.name());
            if !selected {
                continue;
            }
            tracing::info!("Evaluating dataset: {}", dataset.name());
            if let Err(e) = self.run_dataset(dataset, &algorithms, &mut summary) {
                tracing::error!(dataset = dataset.name(), "Dataset skipped: {:#}", e);
                summary.failed_scopes.push(FailedScope {
                    dataset: dataset.name().to_string(),
                    attribute: None,
                    error: format!("{:#}", e),
                });
            }
        }

        tracing::info!(
            "Benchmark finished: {} rows, {} grid rows, {} failed units",
            summary.rows_written,
            summary.grid_rows_written,
            summary.failed_units.len()
        );
        Ok(summary)
    }

    fn run_dataset(
        &self,
        dataset: &Dataset,
        algorithms: &[Arc<dyn Algorithm>],
        summary: &mut BenchmarkSummary,
    ) -> Result<()> {
        let processed = ProcessedData::new(dataset)
            .with_context(|| format!("processing {}", dataset.name()))?;
        let splits = processed.create_train_test_splits(
            self.config.num_trials,
            self.config.train_fraction,
            self.config.seed,
        )?;

        let mut sensitive_values = BTreeMap::new();
        for tag in TAGS {
            sensitive_values.insert(tag, processed.sensitive_values(tag)?);
        }

        for attribute in dataset.sensitive_attributes_with_joint() {
            tracing::info!("  Sensitive attribute: {}", attribute);
            let mut metrics = BTreeMap::new();
            for (tag, values) in &sensitive_values {
                let observed = values.get(&attribute).map(Vec::as_slice).unwrap_or(&[]);
                metrics.insert(*tag, self.metrics.expand(observed));
            }

            let outcome =
                self.run_attribute(dataset, &attribute, algorithms, &splits, &metrics, summary);
            if let Err(e) = outcome {
                tracing::error!(
                    dataset = dataset.name(),
                    attribute = %attribute,
                    "Attribute abandoned: {:#}",
                    e
                );
                summary.failed_scopes.push(FailedScope {
                    dataset: dataset.name().to_string(),
                    attribute: Some(attribute.clone()),
                    error: format!("{:#}", e),
                });
            }
        }
        Ok(())
    }

    fn open_sink(path: &Path, metrics: &[Arc<dyn Metric>]) -> Result<TagSink> {
        let names = metrics.iter().map(|m| m.name()).collect();
        let file = ResultsFile::create(path, names)
            .with_context(|| format!("opening {}", path.display()))?;
        Ok(TagSink {
            file,
            metrics: metrics.to_vec(),
        })
    }

    fn close_sinks(
        sinks: BTreeMap<&'static str, TagSink>,
        summary: &mut BenchmarkSummary,
    ) -> Result<()> {
        for sink in sinks.into_values() {
            let path = sink.file.path().to_path_buf();
            summary
                .results_files
                .push(sink.file.close().with_context(|| format!("closing {}", path.display()))?);
        }
        Ok(())
    }

    fn run_attribute(
        &self,
        dataset: &Dataset,
        attribute: &str,
        algorithms: &[Arc<dyn Algorithm>],
        splits: &BTreeMap<&'static str, Vec<Split>>,
        metrics: &BTreeMap<&'static str, Vec<Arc<dyn Metric>>>,
        summary: &mut BenchmarkSummary,
    ) -> Result<()> {
        let results_dir = &self.config.results_dir;
        let audit = self.config.audit.then(|| AuditWriter::new(self.config.cache_dir.clone()));

        let mut sinks = BTreeMap::new();
        for (tag, tag_metrics) in metrics {
            let path = dataset.results_filename(results_dir, attribute, tag);
            sinks.insert(*tag, Self::open_sink(&path, tag_metrics)?);
        }

        for algorithm in algorithms {
            let name = algorithm.name();
            tracing::info!("    Algorithm: {}", name);
            let tags: Vec<&'static str> = algorithm
                .supported_data_types()
                .into_iter()
                .filter(|tag| {
                    let known = sinks.contains_key(tag);
                    if !known {
                        tracing::warn!(
                            "{} declares unknown data representation '{}', skipped",
                            name,
                            tag
                        );
                    }
                    known
                })
                .collect();

            let mut grid_sinks = BTreeMap::new();
            if algorithm.reports_grid() {
                for tag in &tags {
                    let path = dataset.param_results_filename(results_dir, attribute, tag, &name);
                    grid_sinks.insert(*tag, Self::open_sink(&path, &metrics[tag])?);
                }
            }

            for trial in 0..self.config.num_trials {
                for &tag in &tags {
                    let Some(split) = splits.get(tag).and_then(|trials| trials.get(trial)) else {
                        continue;
                    };
                    let ctx = UnitContext {
                        dataset,
                        attribute,
                        tag,
                        trial,
                    };
                    let Some(sink) = sinks.get_mut(tag) else {
                        continue;
                    };

                    let outcome = evaluate_unit(&ctx, algorithm.as_ref(), split, &sink.metrics)
                        .and_then(|outcome| {
                            Self::write_audit(audit.as_ref(), &ctx, &name, split, &outcome)?;
                            Ok(outcome)
                        });
                    let outcome = match outcome {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            Self::record_failure(&ctx, &name, &e, summary);
                            continue;
                        }
                    };

                    sink.file.write_row(&outcome.primary)?;
                    summary.rows_written += 1;
                    if let Some(grid_sink) = grid_sinks.get_mut(tag) {
                        for row in &outcome.grid {
                            grid_sink.file.write_row(row)?;
                            summary.grid_rows_written += 1;
                        }
                    }
                }
            }

            Self::close_sinks(grid_sinks, summary)?;
        }

        Self::close_sinks(sinks, summary)
    }

    fn write_audit(
        audit: Option<&AuditWriter>,
        ctx: &UnitContext<'_>,
        algorithm: &str,
        split: &Split,
        outcome: &UnitOutcome,
    ) -> crate::error::Result<()> {
        let Some(writer) = audit else {
            return Ok(());
        };
        writer.write(&AuditUnit {
            dataset: ctx.dataset.name(),
            attribute: ctx.attribute,
            tag: ctx.tag,
            algorithm,
            params: &outcome.primary.params,
            trial: ctx.trial,
            train: &split.train,
            test: &split.test,
            predictions: &outcome.predictions,
        })?;
        Ok(())
    }

    fn record_failure(
        ctx: &UnitContext<'_>,
        algorithm: &str,
        error: &FairnessError,
        summary: &mut BenchmarkSummary,
    ) {
        tracing::error!(
            dataset = ctx.dataset.name(),
            attribute = ctx.attribute,
            algorithm,
            trial = ctx.trial,
            tag = ctx.tag,
            code = error.code(),
            "Unit skipped: {}",
            error
        );
        summary.failed_units.push(FailedUnit {
            dataset: ctx.dataset.name().to_string(),
            attribute: ctx.attribute.to_string(),
            algorithm: algorithm.to_string(),
            trial: ctx.trial,
            tag: ctx.tag.to_string(),
            error: error.to_string(),
        });
    }

    /// Save the run summary to a JSON file
    pub fn save_summary(summary: &BenchmarkSummary, output_path: &Path) -> Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("writing {}", output_path.display()))?;
        tracing::info!("Summary saved to {}", output_path.display());
        Ok(())
    }
}
