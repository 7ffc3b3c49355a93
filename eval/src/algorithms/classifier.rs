// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Plain classifiers backed by smartcore
//!
//! The class column is label-encoded to `0..k` over its sorted distinct
//! training values and decoded back after prediction, so predictions stay in
//! the domain of the training labels.

use super::{Algorithm, RunInput, RunOutput};
use crate::error::{FairnessError, Result};
use crate::frame::{Frame, Value};
use crate::params::ParamSet;
use smartcore::linalg::naive::dense_matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::naive_bayes::gaussian::{GaussianNB, GaussianNBParameters};
use smartcore::svm::svc::{SVCParameters, SVC};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierKind {
    /// Linear-kernel support vector classifier, binary only
    Svm,
    GaussianNb,
    LogisticRegression,
    DecisionTree,
}

impl ClassifierKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Svm => "SVM",
            Self::GaussianNb => "GaussianNB",
            Self::LogisticRegression => "LR",
            Self::DecisionTree => "DecisionTree",
        }
    }

    pub fn default_params(&self) -> ParamSet {
        match self {
            Self::Svm => ParamSet::single("C", 1.0).with("kernel", "linear"),
            Self::GaussianNb => ParamSet::new(),
            Self::LogisticRegression => ParamSet::single("alpha", 0.0),
            Self::DecisionTree => ParamSet::single("max_depth", 10),
        }
    }

    /// Fit on `x`/`y` (classes encoded `0..k`) and predict `x_test`
    fn fit_predict(
        &self,
        x: &DenseMatrix<f64>,
        y: &[f64],
        x_test: &DenseMatrix<f64>,
        params: &ParamSet,
    ) -> Result<Vec<f64>> {
        let fail =
            |e: smartcore::error::Failed| FairnessError::algorithm(self.name(), e.to_string());
        let y = y.to_vec();

        match self {
            Self::Svm => {
                let c = params.get_f64_or("C", 1.0)?;
                if let Some(kernel) = params.get("kernel") {
                    if kernel != &Value::from("linear") {
                        return Err(FairnessError::invalid_parameter(
                            "kernel",
                            kernel,
                            "only the linear kernel is supported",
                        ));
                    }
                }
                if y.iter().any(|&class| class > 1.0) {
                    return Err(FairnessError::algorithm(self.name(), "more than two classes"));
                }
                let signed: Vec<f64> =
                    y.iter().map(|&class| if class > 0.5 { 1.0 } else { -1.0 }).collect();
                let model = SVC::fit(x, &signed, SVCParameters::default().with_c(c)).map_err(fail)?;
                let scores = model.predict(x_test).map_err(fail)?;
                Ok(scores.into_iter().map(|s| if s > 0.0 { 1.0 } else { 0.0 }).collect())
            }
            Self::GaussianNb => {
                let model = GaussianNB::fit(x, &y, GaussianNBParameters::default()).map_err(fail)?;
                model.predict(x_test).map_err(fail)
            }
            Self::LogisticRegression => {
                let mut lr_params = LogisticRegressionParameters::default();
                lr_params.alpha = params.get_f64_or("alpha", 0.0)?;
                let model = LogisticRegression::fit(x, &y, lr_params).map_err(fail)?;
                model.predict(x_test).map_err(fail)
            }
            Self::DecisionTree => {
                let depth = params.get_f64_or("max_depth", 10.0)?;
                if depth < 1.0 || depth > u16::MAX as f64 {
                    return Err(FairnessError::invalid_parameter(
                        "max_depth",
                        depth,
                        "must be a positive depth",
                    ));
                }
                let tree_params = DecisionTreeClassifierParameters {
                    max_depth: Some(depth as u16),
                    ..Default::default()
                };
                let model = DecisionTreeClassifier::fit(x, &y, tree_params).map_err(fail)?;
                model.predict(x_test).map_err(fail)
            }
        }
    }
}

/// A classifier that ignores sensitive attributes
///
/// Drops the class and every sensitive column, fits on the remaining
/// numeric features and predicts one label per test row.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    kind: ClassifierKind,
}

impl Classifier {
    pub fn new(kind: ClassifierKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    /// Fit on `train` features and predict `test`, with params merged over
    /// the defaults
    pub fn fit_predict(&self, input: &RunInput<'_>) -> Result<Vec<Value>> {
        let labels = input.train_labels()?;
        if labels.is_empty() {
            return Err(FairnessError::algorithm(self.name(), "empty training set"));
        }
        if input.test.n_rows() == 0 {
            return Ok(Vec::new());
        }

        let mut classes: Vec<Value> = labels.to_vec();
        classes.sort();
        classes.dedup();
        if classes.len() == 1 {
            tracing::debug!("{}: single training class, predicting it for every row", self.name());
            return Ok(vec![classes[0].clone(); input.test.n_rows()]);
        }

        let x_train = feature_matrix(&input.features(input.train), self.kind)?;
        let x_test = feature_matrix(&input.features(input.test), self.kind)?;
        let y: Vec<f64> = labels
            .iter()
            .map(|label| classes.binary_search(label).map(|i| i as f64).unwrap_or(0.0))
            .collect();

        let params = self.default_params().merged(input.params);
        let encoded = self.kind.fit_predict(&x_train, &y, &x_test, &params)?;

        let last = (classes.len() - 1) as f64;
        Ok(encoded
            .into_iter()
            .map(|code| classes[code.round().clamp(0.0, last) as usize].clone())
            .collect())
    }
}

fn feature_matrix(features: &Frame, kind: ClassifierKind) -> Result<DenseMatrix<f64>> {
    if features.n_cols() == 0 {
        return Err(FairnessError::algorithm(
            kind.name(),
            "no feature columns left after dropping sensitive attributes",
        ));
    }
    Ok(DenseMatrix::from_2d_vec(&features.numeric_rows()?))
}

impl Algorithm for Classifier {
    fn name(&self) -> String {
        self.kind.name().to_string()
    }

    fn default_params(&self) -> ParamSet {
        self.kind.default_params()
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
        Ok(RunOutput::predictions(self.fit_predict(input)?))
    }
}
