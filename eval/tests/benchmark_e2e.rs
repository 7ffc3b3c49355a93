// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! End-to-end runs of the benchmark pipeline against a temporary directory

use fairness_eval::algorithms::{Majority, ParamGridSearch, Random};
use fairness_eval::metrics::{Accuracy, DiBinary, SensitiveMetric};
use fairness_eval::{
    Algorithm, AlgorithmRegistry, BenchmarkConfig, Dataset, EvaluationPipeline, FairnessError,
    MetricRegistry, ParamSet, ResultRow, RunInput, RunOutput, Value,
};
use std::fs;
use std::path::Path;

/// Predicts the value of its `v` parameter for every row
struct Constant;

impl Algorithm for Constant {
    fn name(&self) -> String {
        "Constant".to_string()
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::single("v", 1)
    }

    fn param_grid(&self) -> Vec<(String, Vec<Value>)> {
        vec![("v".to_string(), vec![Value::Num(0.0), Value::Num(1.0)])]
    }

    fn run(&self, input: &RunInput<'_>) -> fairness_eval::Result<RunOutput> {
        let v = input.params.get_f64_or("v", 1.0)?;
        Ok(RunOutput::predictions(vec![Value::Num(v); input.test.n_rows()]))
    }
}

struct AlwaysFails;

impl Algorithm for AlwaysFails {
    fn name(&self) -> String {
        "AlwaysFails".to_string()
    }

    fn run(&self, _input: &RunInput<'_>) -> fairness_eval::Result<RunOutput> {
        Err(FairnessError::algorithm("AlwaysFails", "boom"))
    }
}

fn config(dir: &Path, trials: usize) -> BenchmarkConfig {
    BenchmarkConfig {
        num_trials: trials,
        results_dir: dir.join("results"),
        cache_dir: dir.join("cache"),
        audit: false,
        ..Default::default()
    }
}

fn metrics() -> MetricRegistry {
    let mut metrics = MetricRegistry::empty();
    metrics.register(Accuracy).register(DiBinary).register(SensitiveMetric::new(Accuracy));
    metrics
}

fn parsed_rows(path: &Path) -> Vec<ResultRow> {
    data_lines(path).iter().map(|l| ResultRow::parse(l).unwrap()).collect()
}

fn data_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path).unwrap().lines().skip(1).map(str::to_string).collect()
}

#[test]
fn test_rows_per_trial_and_sensitive_columns() {
    let dir = tempfile::tempdir().unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(Random::new(3)).register(Majority);
    let dataset = Dataset::synthetic(90, 11).unwrap();

    let pipeline =
        EvaluationPipeline::new(config(dir.path(), 3), vec![dataset], algorithms, metrics());
    let summary = pipeline.run().unwrap();

    // 3 attributes x 2 algorithms x 3 trials x 2 tags
    assert_eq!(summary.rows_written, 36);
    assert!(summary.failed_units.is_empty());

    let numerical = dir.path().join("results/german-synthetic_sex_numerical.csv");
    let content = fs::read_to_string(&numerical).unwrap();
    assert_eq!(
        content.lines().next().unwrap(),
        "algorithm,params,run-id,accuracy,DIbinary,female-accuracy,male-accuracy"
    );
    let rows = parsed_rows(&numerical);
    assert_eq!(rows.len(), 6);
    let run_ids: Vec<usize> = rows.iter().map(|r| r.run_id).collect();
    assert_eq!(run_ids, vec![0, 1, 2, 0, 1, 2]);
    assert!(rows.iter().all(|r| r.values.len() == 4));

    let binsensitive = dir.path().join("results/german-synthetic_sex_numerical-binsensitive.csv");
    let header = fs::read_to_string(binsensitive).unwrap();
    assert!(header
        .starts_with("algorithm,params,run-id,accuracy,DIbinary,0-accuracy,1-accuracy\n"));
}

#[test]
fn test_failing_algorithm_contributes_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(AlwaysFails).register(Majority);
    let dataset = Dataset::synthetic(60, 4).unwrap();

    let pipeline =
        EvaluationPipeline::new(config(dir.path(), 2), vec![dataset], algorithms, metrics());
    let summary = pipeline.run().unwrap();

    // Majority still runs everywhere
    assert_eq!(summary.rows_written, 12);
    assert_eq!(summary.failed_units.len(), 12);
    let failure = &summary.failed_units[0];
    assert_eq!(failure.algorithm, "AlwaysFails");
    assert_eq!(failure.dataset, "german-synthetic");
    assert!(failure.error.contains("boom"));

    for line in data_lines(&dir.path().join("results/german-synthetic_age_numerical.csv")) {
        assert!(line.starts_with("Majority,"));
    }
}

#[test]
fn test_unmatched_filters_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(Majority);
    let dataset = Dataset::synthetic(30, 2).unwrap();

    let config = BenchmarkConfig {
        algorithms: vec!["Majority".to_string(), "Nope".to_string()],
        datasets: vec!["adult".to_string()],
        ..config(dir.path(), 1)
    };
    let pipeline = EvaluationPipeline::new(config, vec![dataset], algorithms, metrics());
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.unmatched_algorithms, vec!["Nope"]);
    assert_eq!(summary.unmatched_datasets, vec!["adult"]);
    assert_eq!(summary.rows_written, 0);
    assert!(summary.results_files.is_empty());
}

#[test]
fn test_grid_search_writes_auxiliary_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(ParamGridSearch::new(Constant, Accuracy));
    let dataset = Dataset::synthetic(60, 8).unwrap();

    let pipeline =
        EvaluationPipeline::new(config(dir.path(), 2), vec![dataset], algorithms, metrics());
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.rows_written, 12);
    // 2 configurations per unit
    assert_eq!(summary.grid_rows_written, 24);

    let aux = dir.path().join("results/german-synthetic_sex_numerical_Constant-grid-accuracy.csv");
    let rows = parsed_rows(&aux);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].params.to_field(), "v=0");
    assert_eq!(rows[1].params.to_field(), "v=1");

    let primary = dir.path().join("results/german-synthetic_sex_numerical.csv");
    let first = ResultRow::parse(&data_lines(&primary)[0]).unwrap();
    assert_eq!(first.algorithm, "Constant-grid-accuracy");
    assert_eq!(first.params.to_field(), "v=1");
    // The primary row carries the better of the two configurations
    let best = rows[..2].iter().filter_map(|r| r.values[0]).fold(f64::MIN, f64::max);
    assert_eq!(first.values[0], Some(best));
}

#[test]
fn test_audit_frames_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(Majority);
    let dataset = Dataset::synthetic(30, 6).unwrap();

    let config = BenchmarkConfig {
        audit: true,
        ..config(dir.path(), 1)
    };
    let pipeline = EvaluationPipeline::new(config, vec![dataset], algorithms, metrics());
    pipeline.run().unwrap();

    let cache = dir.path().join("cache");
    let test_file = cache.join("german-synthetic_sex_numerical_Majority_0_test.csv");
    let header = fs::read_to_string(&test_file).unwrap();
    assert!(header.lines().next().unwrap().ends_with(",preds"));
    assert!(cache
        .join("german-synthetic_sex-age_numerical-binsensitive_Majority_0_train.csv")
        .exists());
    // 3 attributes x 2 tags x (train + test)
    assert_eq!(fs::read_dir(&cache).unwrap().count(), 12);
}

#[test]
fn test_unwritable_results_dir_abandons_each_attribute() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("results");
    fs::write(&blocker, "not a directory").unwrap();
    let mut algorithms = AlgorithmRegistry::empty();
    algorithms.register(Majority);
    let dataset = Dataset::synthetic(30, 5).unwrap();

    let pipeline =
        EvaluationPipeline::new(config(dir.path(), 1), vec![dataset], algorithms, metrics());
    let summary = pipeline.run().unwrap();

    assert_eq!(summary.rows_written, 0);
    assert!(summary.results_files.is_empty());
    assert!(summary.failed_units.is_empty());
    let attributes: Vec<&str> =
        summary.failed_scopes.iter().filter_map(|s| s.attribute.as_deref()).collect();
    assert_eq!(attributes, vec!["sex", "age", "sex-age"]);
    assert!(summary.failed_scopes.iter().all(|s| s.dataset == "german-synthetic"));
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "not a directory");
}
