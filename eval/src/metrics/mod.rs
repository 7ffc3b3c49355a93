// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Fairness and utility metrics
//!
//! Every metric implements [`Metric`] and is scored against a borrowed
//! [`MetricInput`]. Families:
//! - [`classification`]: population-level rates (accuracy, TPR, TNR, BCR, MCC, ...)
//! - [`disparity`]: protected vs. unprotected ratios and differences
//! - [`utility`]: welfare/cost aggregation over injected strategies
//! - [`sensitive`]: per-value expansion of a base metric
//!
//! Metrics are pure: they never mutate their inputs and keep no state
//! between calls.

pub mod classification;
pub mod disparity;
pub mod sensitive;
pub mod utility;

pub use classification::{Accuracy, Bcr, Fnr, Fpr, Mcc, Tnr, Tpr};
pub use disparity::{
    Cv, DiAvgAll, DiBinary, EqOppoFnDiff, EqOppoFnRatio, EqOppoFpDiff, EqOppoFpRateRatio,
    EqOppoTpRateRatio,
};
pub use sensitive::SensitiveMetric;
pub use utility::{CvWelf, DemParWelf, ExpCost, ExpWelf, UtilityMetric, WelfareFn, WelfarePair};

use crate::confusion::{self, ConfusionMatrix, GroupConfusion};
use crate::error::{ensure_len, FairnessError, Result};
use crate::frame::{Frame, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a metric may look at for one set of predictions
#[derive(Debug, Clone, Copy)]
pub struct MetricInput<'a> {
    pub actual: &'a [Value],
    pub predicted: &'a [Value],
    /// Test-set values of every sensitive attribute, not only the active one
    pub sensitive: &'a HashMap<String, Vec<Value>>,
    /// The active sensitive attribute
    pub attribute: &'a str,
    /// Privileged values of the active attribute
    pub unprotected: &'a [Value],
    pub positive: &'a Value,
    /// Non-class, non-sensitive features per sensitive attribute
    pub nonclass: &'a HashMap<String, Frame>,
}

impl<'a> MetricInput<'a> {
    /// Values of the active attribute, checked against the label length
    pub fn sensitive_values(&self) -> Result<&'a [Value]> {
        let values = self
            .sensitive
            .get(self.attribute)
            .ok_or_else(|| FairnessError::MissingAttribute(self.attribute.to_string()))?;
        ensure_len("sensitive values", self.actual.len(), values.len())?;
        Ok(values)
    }

    /// Non-class features for the active attribute, checked against the label length
    pub fn nonclass_values(&self) -> Result<&'a Frame> {
        let frame = self
            .nonclass
            .get(self.attribute)
            .ok_or_else(|| FairnessError::MissingAttribute(self.attribute.to_string()))?;
        ensure_len("non-class rows", self.actual.len(), frame.n_rows())?;
        Ok(frame)
    }

    pub fn confusion_matrix(&self) -> Result<ConfusionMatrix> {
        ConfusionMatrix::from_predictions(self.actual, self.predicted, self.positive)
    }

    pub fn group_confusion(&self) -> Result<GroupConfusion> {
        confusion::confusion_counts(
            self.actual,
            self.predicted,
            self.sensitive_values()?,
            self.unprotected,
            self.positive,
        )
    }
}

/// A polymorphic unit of measurement over one set of predictions
pub trait Metric: Send + Sync {
    /// Column name used in result headers
    fn name(&self) -> String;

    /// Score the predictions. `None` means the metric has no support in
    /// this input (e.g. a per-value metric whose value is absent).
    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>>;

    /// Concrete metrics to evaluate for a dataset whose active attribute
    /// takes `sensitive_values`. `None` is shorthand for the singleton list
    /// holding this metric; [`MetricRegistry::expand`] substitutes it.
    fn expand_per_dataset(&self, _sensitive_values: &[Value]) -> Option<Vec<Arc<dyn Metric>>> {
        None
    }

    /// Whether score `a` is preferable to score `b` for model selection
    fn is_better_than(&self, a: f64, b: f64) -> bool {
        a > b
    }
}

/// `a` is at least as close to `target` as `b`
pub(crate) fn closer_to(target: f64, a: f64, b: f64) -> bool {
    (a - target).abs() <= (b - target).abs()
}

/// Test-set vectors shared by every metric call of one unit of work
#[derive(Debug, Clone)]
pub struct EvaluationData {
    pub actual: Vec<Value>,
    pub sensitive: HashMap<String, Vec<Value>>,
    pub nonclass: HashMap<String, Frame>,
}

impl EvaluationData {
    /// Pull labels, sensitive columns and non-class features out of a test frame
    pub fn from_test_frame(
        test: &Frame,
        class_attribute: &str,
        sensitive_attributes: &[String],
    ) -> Result<Self> {
        let actual = test.column(class_attribute)?.to_vec();

        let mut dropped: Vec<&str> = vec![class_attribute];
        dropped.extend(sensitive_attributes.iter().map(String::as_str));
        let features = test.drop_columns(&dropped);

        let mut sensitive = HashMap::new();
        let mut nonclass = HashMap::new();
        for attribute in sensitive_attributes {
            sensitive.insert(attribute.clone(), test.column(attribute)?.to_vec());
            nonclass.insert(attribute.clone(), features.clone());
        }

        Ok(Self {
            actual,
            sensitive,
            nonclass,
        })
    }

    pub fn input<'a>(
        &'a self,
        predicted: &'a [Value],
        attribute: &'a str,
        unprotected: &'a [Value],
        positive: &'a Value,
    ) -> MetricInput<'a> {
        MetricInput {
            actual: &self.actual,
            predicted,
            sensitive: &self.sensitive,
            attribute,
            unprotected,
            positive,
            nonclass: &self.nonclass,
        }
    }
}

/// Explicit, ordered list of the metrics a benchmark reports
#[derive(Clone)]
pub struct MetricRegistry {
    metrics: Vec<Arc<dyn Metric>>,
}

impl MetricRegistry {
    pub fn empty() -> Self {
        Self { metrics: Vec::new() }
    }

    pub fn register(&mut self, metric: impl Metric + 'static) -> &mut Self {
        self.metrics.push(Arc::new(metric));
        self
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name()).collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Metric>> {
        self.metrics.iter().find(|m| m.name() == name).cloned()
    }

    /// The concrete metric list for one attribute, in registration order,
    /// with per-value metrics expanded over `sensitive_values`
    pub fn expand(&self, sensitive_values: &[Value]) -> Vec<Arc<dyn Metric>> {
        self.metrics
            .iter()
            .flat_map(|metric| {
                metric
                    .expand_per_dataset(sensitive_values)
                    .unwrap_or_else(|| vec![Arc::clone(metric)])
            })
            .collect()
    }
}

impl Default for MetricRegistry {
    /// Accuracy and fairness metrics reported for every dataset
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(Accuracy)
            .register(Tpr)
            .register(Tnr)
            .register(Bcr)
            .register(Mcc)
            .register(DiBinary)
            .register(DiAvgAll)
            .register(Cv)
            .register(EqOppoTpRateRatio)
            .register(EqOppoFpRateRatio)
            .register(EqOppoFnRatio)
            .register(EqOppoFpDiff)
            .register(EqOppoFnDiff)
            .register(DemParWelf::new(utility::GERMAN_CREDIT_PAYOFFS).with_transform(|w| -w))
            .register(
                DemParWelf::new(utility::GERMAN_CREDIT_PAYOFFS)
                    .with_transform(|w| -(w * w))
                    .with_label("german_credit_payoffs_imbal"),
            )
            .register(
                DemParWelf::new(utility::GERMAN_CREDIT_PAYOFFS)
                    .with_transform(|w| -w)
                    .with_tau(-1.0),
            )
            .register(
                DemParWelf::new(utility::GERMAN_CREDIT_PAYOFFS)
                    .with_transform(|w| -(w * w))
                    .with_tau(-1.0)
                    .with_label("german_credit_payoffs_imbal"),
            )
            .register(
                DemParWelf::new(utility::GERMAN_CREDIT_PAYOFFS)
                    .with_transform(|w| 5.0 - w)
                    .with_tau(1.0)
                    .with_label("german_credit_payoffs_shifted_pos"),
            )
            .register(CvWelf::new(utility::GERMAN_CREDIT_PAYOFFS).with_transform(|w| -w))
            .register(
                CvWelf::new(utility::GERMAN_CREDIT_PAYOFFS)
                    .with_transform(|w: f64| -w.powi(4))
                    .with_label("german_credit_payoffs_imbal"),
            )
            .register(ExpWelf::new(utility::GERMAN_CREDIT_PAYOFFS))
            .register(ExpCost::new(utility::GERMAN_CREDIT_PAYOFFS))
            .register(SensitiveMetric::new(Accuracy))
            .register(SensitiveMetric::new(Tpr))
            .register(SensitiveMetric::new(Bcr));
        registry
    }
}
