// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness benchmark for binary classifiers
//!
//! This crate provides:
//! - Dataset loading, data representations and seeded train/test splits
//! - Confusion statistics split by privileged/protected group
//! - Accuracy, disparity and welfare metrics, with per-value expansion
//! - Baselines, smartcore classifiers, disparate-impact repair and grid search
//! - An evaluation pipeline writing one CSV row per (algorithm, trial, tag)

pub mod algorithms;
pub mod confusion;
pub mod datasets;
pub mod error;
pub mod frame;
pub mod metrics;
pub mod params;
pub mod pipeline;
pub mod results;

pub use algorithms::{Algorithm, AlgorithmRegistry, GridVariant, RunInput, RunOutput};
pub use datasets::{Dataset, DatasetConfig, ProcessedData, Split};
pub use error::{FairnessError, Result};
pub use frame::{Frame, Value};
pub use metrics::{Metric, MetricInput, MetricRegistry};
pub use params::ParamSet;
pub use pipeline::{BenchmarkConfig, BenchmarkSummary, EvaluationPipeline};
pub use results::{ResultRow, ResultsFile};
