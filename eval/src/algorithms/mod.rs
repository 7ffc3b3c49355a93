// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Algorithms under evaluation
//!
//! Implements:
//! - Baselines that ignore the features ([`Random`], [`Majority`])
//! - Plain classifiers backed by smartcore ([`Classifier`])
//! - Disparate-impact repair before a wrapped classifier ([`Feldman`])
//! - Metric-guided grid search over one hyperparameter ([`ParamGridSearch`])
//!
//! Every algorithm receives the train and test frames with the sensitive
//! attributes still present. Only fairness-aware variants may use them;
//! plain classifiers drop them before fitting.

pub mod baseline;
pub mod classifier;
pub mod feldman;
pub mod grid;

pub use baseline::{Majority, Random};
pub use classifier::{Classifier, ClassifierKind};
pub use feldman::Feldman;
pub use grid::ParamGridSearch;

use crate::datasets::{TAG_NUMERICAL, TAG_NUMERICAL_BINSENSITIVE};
use crate::error::Result;
use crate::frame::{Frame, Value};
use crate::metrics::{Accuracy, DiAvgAll};
use crate::params::ParamSet;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything an algorithm gets for one unit of work
#[derive(Debug, Clone, Copy)]
pub struct RunInput<'a> {
    pub train: &'a Frame,
    pub test: &'a Frame,
    pub class_attribute: &'a str,
    pub positive_value: &'a Value,
    /// Every sensitive attribute of the dataset, joint attribute included
    pub sensitive_attributes: &'a [String],
    pub active_sensitive: &'a str,
    pub privileged_values: &'a HashMap<String, Vec<Value>>,
    pub params: &'a ParamSet,
    pub trial: usize,
}

impl<'a> RunInput<'a> {
    /// Same unit of work with a different parameter set
    pub fn with_params(&self, params: &'a ParamSet) -> RunInput<'a> {
        RunInput { params, ..*self }
    }

    /// Same unit of work over different train/test frames
    pub fn with_frames(&self, train: &'a Frame, test: &'a Frame) -> RunInput<'a> {
        RunInput { train, test, ..*self }
    }

    pub fn train_labels(&self) -> Result<&'a [Value]> {
        self.train.column(self.class_attribute)
    }

    /// `frame` without the class and sensitive columns
    pub fn features(&self, frame: &Frame) -> Frame {
        let mut dropped: Vec<&str> = vec![self.class_attribute];
        dropped.extend(self.sensitive_attributes.iter().map(String::as_str));
        frame.drop_columns(&dropped)
    }
}

/// Predictions of one configuration of a grid search
#[derive(Debug, Clone, PartialEq)]
pub struct GridVariant {
    pub param: String,
    pub value: Value,
    pub predictions: Vec<Value>,
}

impl GridVariant {
    pub fn params(&self) -> ParamSet {
        ParamSet::single(self.param.clone(), self.value.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutput {
    /// One label per test row
    pub predictions: Vec<Value>,
    /// Empty unless the algorithm reports a grid
    pub grid: Vec<GridVariant>,
}

impl RunOutput {
    pub fn predictions(predictions: Vec<Value>) -> Self {
        Self {
            predictions,
            grid: Vec::new(),
        }
    }
}

/// A polymorphic unit of prediction
pub trait Algorithm: Send + Sync {
    fn name(&self) -> String;

    /// Data representation tags this algorithm can consume
    fn supported_data_types(&self) -> Vec<&'static str> {
        vec![TAG_NUMERICAL, TAG_NUMERICAL_BINSENSITIVE]
    }

    fn default_params(&self) -> ParamSet {
        ParamSet::new()
    }

    /// Values to sweep per parameter when wrapped in a grid search
    fn param_grid(&self) -> Vec<(String, Vec<Value>)> {
        Vec::new()
    }

    /// Whether [`RunOutput::grid`] carries per-configuration predictions
    /// that deserve their own result rows
    fn reports_grid(&self) -> bool {
        false
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput>;
}

/// Explicit, ordered list of the algorithms a benchmark may run
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    algorithms: Vec<Arc<dyn Algorithm>>,
}

impl AlgorithmRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Baselines, plain classifiers, their repaired variants and two grid searches
    pub fn with_defaults(seed: u64) -> Self {
        let mut registry = Self::empty();
        registry
            .register(Random::new(seed))
            .register(Majority)
            .register(Classifier::new(ClassifierKind::Svm))
            .register(Classifier::new(ClassifierKind::GaussianNb))
            .register(Classifier::new(ClassifierKind::LogisticRegression))
            .register(Classifier::new(ClassifierKind::DecisionTree))
            .register(Feldman::new(Classifier::new(ClassifierKind::Svm)))
            .register(Feldman::new(Classifier::new(ClassifierKind::LogisticRegression)))
            .register(Feldman::new(Classifier::new(ClassifierKind::DecisionTree)))
            .register(ParamGridSearch::new(
                Feldman::new(Classifier::new(ClassifierKind::Svm)),
                DiAvgAll,
            ))
            .register(ParamGridSearch::new(
                Feldman::new(Classifier::new(ClassifierKind::LogisticRegression)),
                Accuracy,
            ));
        registry
    }

    pub fn register(&mut self, algorithm: impl Algorithm + 'static) -> &mut Self {
        self.algorithms.push(Arc::new(algorithm));
        self
    }

    pub fn len(&self) -> usize {
        self.algorithms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.algorithms.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.algorithms.iter().map(|a| a.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Algorithm>> {
        self.algorithms.iter()
    }

    /// Algorithms whose name is in `filter`, in registration order, plus
    /// the filter names that matched nothing. An empty filter selects all.
    pub fn select(&self, filter: &[String]) -> (Vec<Arc<dyn Algorithm>>, Vec<String>) {
        if filter.is_empty() {
            return (self.algorithms.clone(), Vec::new());
        }
        let names = self.names();
        let selected = self
            .algorithms
            .iter()
            .zip(&names)
            .filter(|(_, name)| filter.contains(*name))
            .map(|(algorithm, _)| Arc::clone(algorithm))
            .collect();
        let unmatched = filter.iter().filter(|f| !names.contains(*f)).cloned().collect();
        (selected, unmatched)
    }
}
