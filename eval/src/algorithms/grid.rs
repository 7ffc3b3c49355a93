// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Metric-guided grid search
//!
//! Runs the inner algorithm once per grid point, scores each run on the
//! test split with the selection metric and returns the best run as the
//! primary predictions. Every run is also returned as a [`GridVariant`] so
//! it can be reported on its own.

use super::{Algorithm, GridVariant, RunInput, RunOutput};
use crate::error::{FairnessError, Result};
use crate::metrics::{EvaluationData, Metric};
use crate::params::ParamSet;
use std::sync::Arc;

pub struct ParamGridSearch {
    inner: Arc<dyn Algorithm>,
    metric: Arc<dyn Metric>,
}

impl ParamGridSearch {
    pub fn new(inner: impl Algorithm + 'static, metric: impl Metric + 'static) -> Self {
        Self {
            inner: Arc::new(inner),
            metric: Arc::new(metric),
        }
    }

    pub fn grid_size(&self) -> usize {
        self.inner.param_grid().iter().map(|(_, values)| values.len()).sum()
    }

    /// `candidate` replaces `best` when it has a score and `best` does not,
    /// or when the metric prefers it
    fn improves(&self, candidate: Option<f64>, best: Option<f64>) -> bool {
        match (candidate, best) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(c), Some(b)) => self.metric.is_better_than(c, b),
        }
    }
}

impl Algorithm for ParamGridSearch {
    fn name(&self) -> String {
        format!("{}-grid-{}", self.inner.name(), self.metric.name())
    }

    fn supported_data_types(&self) -> Vec<&'static str> {
        self.inner.supported_data_types()
    }

    fn default_params(&self) -> ParamSet {
        self.inner.default_params()
    }

    fn reports_grid(&self) -> bool {
        true
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
        let grid = self.inner.param_grid();
        if grid.iter().all(|(_, values)| values.is_empty()) {
            return Err(FairnessError::algorithm(
                self.name(),
                format!("{} has no parameter grid", self.inner.name()),
            ));
        }

        let data = EvaluationData::from_test_frame(
            input.test,
            input.class_attribute,
            input.sensitive_attributes,
        )?;
        let unprotected = input
            .privileged_values
            .get(input.active_sensitive)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut best: Option<(Option<f64>, usize)> = None;
        let mut variants = Vec::with_capacity(self.grid_size());
        for (param, values) in &grid {
            for value in values {
                let params = input.params.merged(&ParamSet::single(param.clone(), value.clone()));
                let output = self.inner.run(&input.with_params(&params))?;

                let metric_input = data.input(
                    &output.predictions,
                    input.active_sensitive,
                    unprotected,
                    input.positive_value,
                );
                let score = self.metric.calc(&metric_input)?.filter(|s| !s.is_nan());
                tracing::debug!("{} {}={}: {:?}", self.name(), param, value, score);

                if best.map_or(true, |(best_score, _)| self.improves(score, best_score)) {
                    best = Some((score, variants.len()));
                }
                variants.push(GridVariant {
                    param: param.clone(),
                    value: value.clone(),
                    predictions: output.predictions,
                });
            }
        }

        let best_index = best.map(|(_, index)| index).unwrap_or(0);
        Ok(RunOutput {
            predictions: variants[best_index].predictions.clone(),
            grid: variants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, Value};
    use crate::metrics::{Accuracy, DiBinary};
    use std::collections::HashMap;

    /// Predicts the label for the first `k` rows and its negation afterwards
    struct Prefix;

    impl Algorithm for Prefix {
        fn name(&self) -> String {
            "Prefix".to_string()
        }

        fn param_grid(&self) -> Vec<(String, Vec<Value>)> {
            vec![("k".to_string(), (0..=4).map(Value::from).collect())]
        }

        fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
            let k = input.params.get_f64_or("k", 0.0)? as usize;
            let labels = input.test.column(input.class_attribute)?;
            let predictions = labels
                .iter()
                .enumerate()
                .map(|(i, label)| match (i < k, label.as_f64()) {
                    (true, _) => label.clone(),
                    (false, Some(v)) => Value::Num(1.0 - v),
                    (false, None) => label.clone(),
                })
                .collect();
            Ok(RunOutput::predictions(predictions))
        }
    }

    struct Broken;

    impl Algorithm for Broken {
        fn name(&self) -> String {
            "Broken".to_string()
        }

        fn param_grid(&self) -> Vec<(String, Vec<Value>)> {
            vec![("k".to_string(), vec![Value::Num(1.0)])]
        }

        fn run(&self, _input: &RunInput<'_>) -> Result<RunOutput> {
            Err(FairnessError::algorithm("Broken", "always fails"))
        }
    }

    fn test_frame() -> Frame {
        Frame::new(
            vec!["sex".into(), "credit".into()],
            vec![
                [1, 1, 0, 0].iter().map(|&v| Value::from(v)).collect(),
                [1, 0, 1, 0].iter().map(|&v| Value::from(v)).collect(),
            ],
        )
        .unwrap()
    }

    fn run(search: &ParamGridSearch) -> Result<RunOutput> {
        let frame = test_frame();
        let sensitive = vec!["sex".to_string()];
        let privileged = HashMap::from([("sex".to_string(), vec![Value::Num(1.0)])]);
        let positive = Value::Num(1.0);
        let params = search.default_params();
        search.run(&RunInput {
            train: &frame,
            test: &frame,
            class_attribute: "credit",
            positive_value: &positive,
            sensitive_attributes: &sensitive,
            active_sensitive: "sex",
            privileged_values: &privileged,
            params: &params,
            trial: 0,
        })
    }

    #[test]
    fn test_primary_predictions_are_the_best_configuration() {
        let search = ParamGridSearch::new(Prefix, Accuracy);
        let output = run(&search).unwrap();
        assert_eq!(output.grid.len(), search.grid_size());
        assert_eq!(output.grid.len(), 5);

        let best = output.grid.iter().find(|v| v.value == Value::Num(4.0)).unwrap();
        assert_eq!(output.predictions, best.predictions);
        assert_eq!(best.params().to_field(), "k=4");
    }

    #[test]
    fn test_selection_respects_metric_direction() {
        // DIbinary prefers closeness to 1: k=0, 2 and 4 reach parity while
        // k=1 and k=3 do not. Equal scores go to the later configuration.
        let search = ParamGridSearch::new(Prefix, DiBinary);
        let output = run(&search).unwrap();
        assert_eq!(search.name(), "Prefix-grid-DIbinary");
        assert_eq!(output.predictions, output.grid[4].predictions);
        assert_ne!(output.predictions, output.grid[3].predictions);
    }

    #[test]
    fn test_inner_failure_propagates() {
        let search = ParamGridSearch::new(Broken, Accuracy);
        assert!(run(&search).is_err());
        assert!(search.reports_grid());
    }
}
