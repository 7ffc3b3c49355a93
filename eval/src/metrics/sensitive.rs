// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Per-value metrics
//!
//! A [`SensitiveMetric`] wraps a base metric and, once expanded for a
//! dataset, yields one concrete metric per observed value of the active
//! sensitive attribute. Each concrete metric scores the base metric on the
//! instances holding that value only.

use super::{Metric, MetricInput};
use crate::error::{ensure_len, Result};
use crate::frame::{Frame, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct SensitiveMetric {
    base: Arc<dyn Metric>,
    value: Option<Value>,
}

impl SensitiveMetric {
    /// Unexpanded template over `base`
    pub fn new(base: impl Metric + 'static) -> Self {
        Self {
            base: Arc::new(base),
            value: None,
        }
    }

    fn for_value(base: Arc<dyn Metric>, value: Value) -> Self {
        Self {
            base,
            value: Some(value),
        }
    }
}

impl Metric for SensitiveMetric {
    fn name(&self) -> String {
        match &self.value {
            Some(value) => format!("{}-{}", value, self.base.name()),
            None => self.base.name(),
        }
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let Some(value) = &self.value else {
            return self.base.calc(input);
        };

        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        let indices: Vec<usize> = input
            .sensitive_values()?
            .iter()
            .enumerate()
            .filter(|(_, v)| *v == value)
            .map(|(i, _)| i)
            .collect();
        if indices.is_empty() {
            return Ok(None);
        }

        let pick = |values: &[Value]| -> Vec<Value> {
            indices.iter().map(|&i| values[i].clone()).collect()
        };
        let actual = pick(input.actual);
        let predicted = pick(input.predicted);
        let mut sensitive = HashMap::with_capacity(input.sensitive.len());
        for (name, values) in input.sensitive {
            ensure_len("sensitive values", input.actual.len(), values.len())?;
            sensitive.insert(name.clone(), pick(values.as_slice()));
        }
        let mut nonclass: HashMap<String, Frame> = HashMap::with_capacity(input.nonclass.len());
        for (name, frame) in input.nonclass {
            ensure_len("non-class rows", input.actual.len(), frame.n_rows())?;
            nonclass.insert(name.clone(), frame.select_rows(&indices));
        }
        let unprotected = [value.clone()];

        self.base.calc(&MetricInput {
            actual: &actual,
            predicted: &predicted,
            sensitive: &sensitive,
            attribute: input.attribute,
            unprotected: &unprotected,
            positive: input.positive,
            nonclass: &nonclass,
        })
    }

    fn expand_per_dataset(&self, sensitive_values: &[Value]) -> Option<Vec<Arc<dyn Metric>>> {
        if self.value.is_some() {
            return None;
        }
        Some(
            sensitive_values
                .iter()
                .map(|v| {
                    Arc::new(Self::for_value(Arc::clone(&self.base), v.clone())) as Arc<dyn Metric>
                })
                .collect(),
        )
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        self.base.is_better_than(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{Accuracy, Fpr, Tpr};

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    struct Fixture {
        actual: Vec<Value>,
        predicted: Vec<Value>,
        sensitive: HashMap<String, Vec<Value>>,
        nonclass: HashMap<String, Frame>,
        positive: Value,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                actual: texts(&["y", "y", "n", "y", "n", "n"]),
                predicted: texts(&["y", "n", "n", "y", "y", "n"]),
                sensitive: HashMap::from([(
                    "race".to_string(),
                    texts(&["w", "w", "w", "b", "b", "b"]),
                )]),
                nonclass: HashMap::new(),
                positive: Value::from("y"),
            }
        }

        fn input(&self) -> MetricInput<'_> {
            MetricInput {
                actual: &self.actual,
                predicted: &self.predicted,
                sensitive: &self.sensitive,
                attribute: "race",
                unprotected: &[],
                positive: &self.positive,
                nonclass: &self.nonclass,
            }
        }
    }

    #[test]
    fn test_expands_to_one_metric_per_value() {
        let template = SensitiveMetric::new(Accuracy);
        let expanded = template.expand_per_dataset(&texts(&["b", "w", "x"])).unwrap();
        let names: Vec<String> = expanded.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["b-accuracy", "w-accuracy", "x-accuracy"]);
        assert!(expanded[0].expand_per_dataset(&texts(&["b"])).is_none());
    }

    #[test]
    fn test_scores_only_the_selected_group() {
        let fixture = Fixture::new();
        let expanded = SensitiveMetric::new(Accuracy)
            .expand_per_dataset(&texts(&["w", "b"]))
            .unwrap();
        let white = expanded[0].calc(&fixture.input()).unwrap().unwrap();
        let black = expanded[1].calc(&fixture.input()).unwrap().unwrap();
        assert!((white - 2.0 / 3.0).abs() < 1e-12);
        assert!((black - 2.0 / 3.0).abs() < 1e-12);

        let tpr = SensitiveMetric::new(Tpr).expand_per_dataset(&texts(&["w"])).unwrap();
        assert!((tpr[0].calc(&fixture.input()).unwrap().unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_absent_value_has_no_score() {
        let fixture = Fixture::new();
        let expanded = SensitiveMetric::new(Accuracy).expand_per_dataset(&texts(&["x"])).unwrap();
        assert_eq!(expanded[0].calc(&fixture.input()).unwrap(), None);
    }

    #[test]
    fn test_short_nonclass_frame_is_a_shape_mismatch() {
        let mut fixture = Fixture::new();
        let short = Frame::from_rows(vec!["income".into()], vec![vec![Value::Num(1.0)]]).unwrap();
        fixture.nonclass.insert("race".to_string(), short);
        let expanded = SensitiveMetric::new(Accuracy).expand_per_dataset(&texts(&["b"])).unwrap();
        let err = expanded[0].calc(&fixture.input()).unwrap_err();
        assert_eq!(err.code(), "shape_mismatch");
        assert_eq!(fixture.input().nonclass_values().unwrap_err().code(), "shape_mismatch");
    }

    #[test]
    fn test_calc_is_idempotent_and_direction_follows_base() {
        let fixture = Fixture::new();
        let expanded = SensitiveMetric::new(Fpr).expand_per_dataset(&texts(&["b"])).unwrap();
        let first = expanded[0].calc(&fixture.input()).unwrap();
        assert_eq!(first, expanded[0].calc(&fixture.input()).unwrap());
        assert!(expanded[0].is_better_than(0.1, 0.3));
    }
}
