// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness benchmark CLI
//!
//! Usage:
//!   fairness-benchmark --trials 10 --seed 42
//!   fairness-benchmark --dataset-config german.json --algorithms SVM,Feldman-SVM
//!   fairness-benchmark --list

use anyhow::Result;
use clap::Parser;
use fairness_eval::algorithms::AlgorithmRegistry;
use fairness_eval::datasets::{Dataset, DatasetConfig};
use fairness_eval::metrics::MetricRegistry;
use fairness_eval::pipeline::{BenchmarkConfig, EvaluationPipeline};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fairness-benchmark")]
#[command(about = "Compare classifiers on accuracy and fairness metrics")]
#[command(version)]
struct Args {
    /// Benchmark configuration (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dataset configuration files (JSON); the synthetic dataset is used when absent
    #[arg(short, long = "dataset-config")]
    dataset_config: Vec<PathBuf>,

    /// Rows of the synthetic dataset
    #[arg(long, default_value_t = 1000)]
    synthetic_size: usize,

    /// Number of train/test splits
    #[arg(short, long)]
    trials: Option<usize>,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Algorithms to run (comma-separated, empty = all)
    #[arg(short, long, value_delimiter = ',')]
    algorithms: Vec<String>,

    /// Datasets to run (comma-separated, empty = all)
    #[arg(long, value_delimiter = ',')]
    datasets: Vec<String>,

    /// Output directory for result files
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip writing train/test frames with predictions for every unit
    #[arg(long)]
    no_audit: bool,

    /// List registered algorithms and metrics
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

    let mut config = match &args.config {
        Some(path) => BenchmarkConfig::from_json_file(path)?,
        None => BenchmarkConfig::default(),
    };
    if let Some(trials) = args.trials {
        config.num_trials = trials;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if !args.algorithms.is_empty() {
        config.algorithms = args.algorithms.clone();
    }
    if !args.datasets.is_empty() {
        config.datasets = args.datasets.clone();
    }
    if let Some(output) = &args.output {
        config.cache_dir = output.join("train_test_datasets");
        config.results_dir = output.clone();
    }
    if args.no_audit {
        config.audit = false;
    }

    let algorithms = AlgorithmRegistry::with_defaults(config.seed);
    let metrics = MetricRegistry::default();

    if args.list {
        println!("Available algorithms:");
        println!("---------------------");
        for name in algorithms.names() {
            println!("  {}", name);
        }
        println!("\nMetrics:");
        println!("--------");
        for name in metrics.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    let datasets = if args.dataset_config.is_empty() {
        tracing::info!(
            "Using synthetic dataset ({} rows, seed={})",
            args.synthetic_size,
            config.seed
        );
        vec![Dataset::synthetic(args.synthetic_size, config.seed)?]
    } else {
        args.dataset_config
            .iter()
            .map(|path| Ok(Dataset::load_csv(DatasetConfig::from_json_file(path)?)?))
            .collect::<Result<Vec<_>>>()?
    };

    tracing::info!("Fairness Benchmark");
    tracing::info!("==================");
    tracing::info!("Trials: {}", config.num_trials);
    tracing::info!("Seed: {}", config.seed);
    tracing::info!("Results: {}", config.results_dir.display());

    let results_dir = config.results_dir.clone();
    let pipeline = EvaluationPipeline::new(config, datasets, algorithms, metrics);
    let summary = pipeline.run()?;

    println!("\n{}", "=".repeat(70));
    println!("BENCHMARK SUMMARY");
    println!("{}", "=".repeat(70));
    println!("\nRows written: {}", summary.rows_written);
    println!("Grid rows written: {}", summary.grid_rows_written);
    println!("Result files: {}", summary.results_files.len());

    if !summary.failed_units.is_empty() {
        println!("\nFailed units:");
        println!("{:-<70}", "");
        for unit in &summary.failed_units {
            println!(
                "{} / {} / {} / trial {} / {}: {}",
                unit.dataset, unit.attribute, unit.algorithm, unit.trial, unit.tag, unit.error
            );
        }
        println!("{:-<70}", "");
    }
    for scope in &summary.failed_scopes {
        let attribute = scope.attribute.as_deref().unwrap_or("");
        println!("Abandoned {} {}: {}", scope.dataset, attribute, scope.error);
    }
    if !summary.unmatched_algorithms.is_empty() {
        println!("\nUnknown algorithms: {}", summary.unmatched_algorithms.join(", "));
    }
    if !summary.unmatched_datasets.is_empty() {
        println!("Unknown datasets: {}", summary.unmatched_datasets.join(", "));
    }

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let json_path = results_dir.join(format!("benchmark_{}.json", timestamp));
    EvaluationPipeline::save_summary(&summary, &json_path)?;
    println!("\nSummary saved to: {}", json_path.display());

    println!("\nBenchmark complete!");

    Ok(())
}
