// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Disparate-impact repair followed by a plain classifier
//!
//! Every numeric feature is repaired independently within each frame. An
//! instance's value is located by its quantile within its group (the
//! active sensitive attribute's value); the target is the median over
//! groups of each group's value at that quantile. `lambda` moves the value
//! part of the way toward the target: 0 leaves the data alone, 1 fully
//! aligns the group distributions.

use super::{Algorithm, Classifier, RunInput, RunOutput};
use crate::error::{FairnessError, Result};
use crate::frame::{Frame, Value};
use crate::params::ParamSet;
use std::collections::BTreeMap;

const LAMBDA: &str = "lambda";
const LAMBDA_DEFAULT: f64 = 1.0;

#[derive(Debug, Clone, Copy)]
pub struct Feldman {
    inner: Classifier,
}

impl Feldman {
    pub fn new(inner: Classifier) -> Self {
        Self { inner }
    }
}

impl Algorithm for Feldman {
    fn name(&self) -> String {
        format!("Feldman-{}", self.inner.name())
    }

    fn default_params(&self) -> ParamSet {
        self.inner.default_params().with(LAMBDA, LAMBDA_DEFAULT)
    }

    fn param_grid(&self) -> Vec<(String, Vec<Value>)> {
        let lambdas = (1..=20).map(|k| Value::Num(k as f64 / 20.0)).collect();
        vec![(LAMBDA.to_string(), lambdas)]
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
        let lambda = input.params.get_f64_or(LAMBDA, LAMBDA_DEFAULT)?;
        if !(0.0..=1.0).contains(&lambda) {
            return Err(FairnessError::invalid_parameter(LAMBDA, lambda, "must lie in [0, 1]"));
        }

        let train = repair(input.train, input, lambda)?;
        let test = repair(input.test, input, lambda)?;
        tracing::debug!("{}: repaired features with lambda={}", self.name(), lambda);

        self.inner.run(&input.with_frames(&train, &test))
    }
}

/// Repair every numeric non-class, non-sensitive column of `frame`
fn repair(frame: &Frame, input: &RunInput<'_>, lambda: f64) -> Result<Frame> {
    let groups = frame.column(input.active_sensitive)?.to_vec();
    let features = input.features(frame);

    let mut repaired = frame.clone();
    for name in features.columns() {
        if !features.is_numeric_column(name)? {
            continue;
        }
        let values: Vec<f64> = features.column(name)?.iter().filter_map(Value::as_f64).collect();
        let column = repair_column(&values, &groups, lambda).into_iter().map(Value::Num).collect();
        repaired = repaired.with_column(name, column)?;
    }
    Ok(repaired)
}

fn repair_column(values: &[f64], groups: &[Value], lambda: f64) -> Vec<f64> {
    let mut by_group: BTreeMap<&Value, Vec<f64>> = BTreeMap::new();
    for (value, group) in values.iter().zip(groups) {
        by_group.entry(group).or_default().push(*value);
    }
    for sorted in by_group.values_mut() {
        sorted.sort_by(f64::total_cmp);
    }

    values
        .iter()
        .zip(groups)
        .map(|(&value, group)| {
            let own = &by_group[group];
            let quantile = if own.len() > 1 {
                own.partition_point(|&v| v < value) as f64 / (own.len() - 1) as f64
            } else {
                0.5
            };
            let mut at_quantile: Vec<f64> =
                by_group.values().map(|sorted| value_at(sorted, quantile)).collect();
            at_quantile.sort_by(f64::total_cmp);
            let target = median(&at_quantile);
            value + lambda * (target - value)
        })
        .collect()
}

fn value_at(sorted: &[f64], quantile: f64) -> f64 {
    let index = (quantile * (sorted.len() - 1) as f64).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ClassifierKind;
    use std::collections::HashMap;

    #[test]
    fn test_full_repair_aligns_group_distributions() {
        let values = [1.0, 2.0, 3.0, 11.0, 12.0, 13.0];
        let groups: Vec<Value> =
            ["a", "a", "a", "b", "b", "b"].iter().map(|&g| Value::from(g)).collect();
        let repaired = repair_column(&values, &groups, 1.0);
        assert_eq!(&repaired[..3], &repaired[3..]);
        assert_eq!(repaired[..3].to_vec(), vec![6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_zero_lambda_is_identity() {
        let values = [4.0, 1.0, 9.0, 2.0];
        let groups: Vec<Value> = [0.0, 1.0, 0.0, 1.0].iter().map(|&g| Value::Num(g)).collect();
        assert_eq!(repair_column(&values, &groups, 0.0), values.to_vec());
    }

    #[test]
    fn test_grid_and_defaults() {
        let feldman = Feldman::new(Classifier::new(ClassifierKind::Svm));
        assert_eq!(feldman.name(), "Feldman-SVM");
        assert_eq!(feldman.default_params().to_field(), "C=1;kernel=linear;lambda=1");
        let grid = feldman.param_grid();
        assert_eq!(grid[0].1.len(), 20);
        assert_eq!(grid[0].1[2].to_string(), "0.15");
    }

    #[test]
    fn test_run_leaves_class_and_sensitive_untouched() {
        let n = 40;
        let x: Vec<Value> = (0..n)
            .map(|i| Value::Num(i as f64 + if i % 2 == 0 { 0.0 } else { 100.0 }))
            .collect();
        let sex: Vec<Value> = (0..n).map(|i| Value::Num((i % 2) as f64)).collect();
        let credit: Vec<Value> = (0..n).map(|i| Value::Num(((i / 2) % 2) as f64)).collect();
        let frame = Frame::new(
            vec!["x".into(), "sex".into(), "credit".into()],
            vec![x, sex.clone(), credit],
        )
        .unwrap();

        let sensitive = vec!["sex".to_string()];
        let privileged = HashMap::from([("sex".to_string(), vec![Value::Num(1.0)])]);
        let positive = Value::Num(1.0);
        let params = ParamSet::single(LAMBDA, 1.0);
        let input = RunInput {
            train: &frame,
            test: &frame,
            class_attribute: "credit",
            positive_value: &positive,
            sensitive_attributes: &sensitive,
            active_sensitive: "sex",
            privileged_values: &privileged,
            params: &params,
            trial: 0,
        };
        let repaired = repair(&frame, &input, 1.0).unwrap();
        assert_eq!(repaired.column("sex").unwrap(), sex.as_slice());
        assert_eq!(repaired.column("credit").unwrap(), frame.column("credit").unwrap());
        assert_ne!(repaired.column("x").unwrap(), frame.column("x").unwrap());

        let feldman = Feldman::new(Classifier::new(ClassifierKind::DecisionTree));
        let output = feldman.run(&input).unwrap();
        assert_eq!(output.predictions.len(), n);
        assert!(output.grid.is_empty());
    }

    #[test]
    fn test_lambda_out_of_range() {
        let frame = Frame::new(
            vec!["x".into(), "sex".into(), "credit".into()],
            vec![vec![Value::Num(1.0)]; 3],
        )
        .unwrap();
        let sensitive = vec!["sex".to_string()];
        let privileged = HashMap::new();
        let positive = Value::Num(1.0);
        let params = ParamSet::single(LAMBDA, 1.5);
        let input = RunInput {
            train: &frame,
            test: &frame,
            class_attribute: "credit",
            positive_value: &positive,
            sensitive_attributes: &sensitive,
            active_sensitive: "sex",
            privileged_values: &privileged,
            params: &params,
            trial: 0,
        };
        let feldman = Feldman::new(Classifier::new(ClassifierKind::LogisticRegression));
        let err = feldman.run(&input).unwrap_err();
        assert_eq!(err.code(), "invalid_parameter");
    }
}
