// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone algorithm runner
//!
//! Evaluates one algorithm on one dataset, attribute and data representation
//! for quick inspection. Nothing is written to disk.

use anyhow::{bail, Context, Result};
use clap::Parser;
use fairness_eval::algorithms::AlgorithmRegistry;
use fairness_eval::datasets::{Dataset, DatasetConfig, ProcessedData, TAGS, TAG_NUMERICAL};
use fairness_eval::metrics::MetricRegistry;
use fairness_eval::pipeline::{evaluate_unit, UnitContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "run-algorithm")]
#[command(about = "Run a single algorithm and print its metrics")]
#[command(version)]
struct Args {
    /// Algorithm to run (see --list)
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Dataset configuration (JSON); the synthetic dataset is used when absent
    #[arg(short, long)]
    dataset_config: Option<PathBuf>,

    /// Sensitive attribute (defaults to the first one)
    #[arg(long)]
    attribute: Option<String>,

    /// Data representation (original, numerical, numerical-binsensitive)
    #[arg(long, default_value = TAG_NUMERICAL)]
    tag: String,

    /// Number of train/test splits
    #[arg(short, long, default_value_t = 3)]
    trials: usize,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Rows of the synthetic dataset
    #[arg(short, long, default_value_t = 1000)]
    num_samples: usize,

    /// List available algorithms
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let registry = AlgorithmRegistry::with_defaults(args.seed);

    if args.list {
        println!("Available algorithms:");
        println!("---------------------");
        for algorithm in registry.iter() {
            println!(
                "  {}: {} [{}]",
                algorithm.name(),
                algorithm.default_params(),
                algorithm.supported_data_types().join(", ")
            );
        }
        return Ok(());
    }

    let Some(name) = args.algorithm.as_deref() else {
        bail!("no algorithm given; use --list to see the available ones");
    };
    let Some(algorithm) = registry.iter().find(|a| a.name().eq_ignore_ascii_case(name)) else {
        bail!("unknown algorithm '{}'; registered: {}", name, registry.names().join(", "));
    };
    let Some(tag) = TAGS.iter().copied().find(|t| *t == args.tag) else {
        bail!("unknown data representation '{}'", args.tag);
    };
    if !algorithm.supported_data_types().contains(&tag) {
        bail!("{} does not support the '{}' representation", algorithm.name(), tag);
    }

    let dataset = match &args.dataset_config {
        Some(path) => Dataset::load_csv(DatasetConfig::from_json_file(path)?)?,
        None => {
            tracing::info!(
                "Using synthetic dataset ({} rows, seed={})",
                args.num_samples,
                args.seed
            );
            Dataset::synthetic(args.num_samples, args.seed)?
        }
    };
    let attributes = dataset.sensitive_attributes_with_joint();
    let attribute = match &args.attribute {
        Some(a) if attributes.contains(a) => a.clone(),
        Some(a) => bail!("'{}' is not a sensitive attribute of {}", a, dataset.name()),
        None => attributes.first().cloned().context("dataset has no sensitive attributes")?,
    };

    let processed = ProcessedData::new(&dataset)?;
    let splits = processed.create_train_test_splits(args.trials, 2.0 / 3.0, args.seed)?;
    let observed = processed.sensitive_values(tag)?.remove(&attribute).unwrap_or_default();
    let metrics = MetricRegistry::default().expand(&observed);

    println!("\nDataset: {} ({} rows)", dataset.name(), dataset.frame.n_rows());
    println!("Attribute: {}  Representation: {}", attribute, tag);
    println!("\n{}", "=".repeat(70));
    println!("{} {}", algorithm.name(), algorithm.default_params());
    println!("{}", "=".repeat(70));

    let mut rows = Vec::with_capacity(args.trials);
    for (trial, split) in splits.get(tag).map(Vec::as_slice).unwrap_or(&[]).iter().enumerate() {
        let ctx = UnitContext {
            dataset: &dataset,
            attribute: &attribute,
            tag,
            trial,
        };
        match evaluate_unit(&ctx, algorithm.as_ref(), split, &metrics) {
            Ok(outcome) => rows.push(outcome.primary),
            Err(e) => tracing::error!(trial, "Trial failed: {}", e),
        }
    }

    println!("{:<45} {:>10} {:>10}", "Metric", "Mean", "Trials");
    println!("{:-<70}", "");
    for (i, metric) in metrics.iter().enumerate() {
        let values: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.values[i])
            .filter(|v| v.is_finite())
            .collect();
        let mean = if values.is_empty() {
            "-".to_string()
        } else {
            format!("{:.4}", values.iter().sum::<f64>() / values.len() as f64)
        };
        println!("{:<45} {:>10} {:>10}", metric.name(), mean, values.len());
    }
    println!("{:-<70}", "");
    println!("{} of {} trials succeeded", rows.len(), args.trials);

    Ok(())
}
