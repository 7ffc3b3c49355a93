// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Population-level classification metrics
//!
//! These ignore the privileged-value partition; composite metrics (BCR,
//! FPR, FNR) delegate to TPR/TNR instead of recounting.

use super::{Metric, MetricInput};
use crate::error::{ensure_len, Result};

/// Fraction of predictions equal to the actual label (raw values, not binarized)
#[derive(Debug, Clone, Copy, Default)]
pub struct Accuracy;

impl Metric for Accuracy {
    fn name(&self) -> String {
        "accuracy".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        if input.actual.is_empty() {
            return Ok(Some(0.0));
        }
        let correct = input
            .actual
            .iter()
            .zip(input.predicted)
            .filter(|(truth, pred)| truth == pred)
            .count();
        Ok(Some(correct as f64 / input.actual.len() as f64))
    }
}

/// True positive rate over the whole population
#[derive(Debug, Clone, Copy, Default)]
pub struct Tpr;

impl Metric for Tpr {
    fn name(&self) -> String {
        "TPR".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        Ok(Some(input.confusion_matrix()?.true_positive_rate()))
    }
}

/// True negative rate over the whole population
#[derive(Debug, Clone, Copy, Default)]
pub struct Tnr;

impl Metric for Tnr {
    fn name(&self) -> String {
        "TNR".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        Ok(Some(input.confusion_matrix()?.true_negative_rate()))
    }
}

/// 1 - TNR
#[derive(Debug, Clone, Copy, Default)]
pub struct Fpr;

impl Metric for Fpr {
    fn name(&self) -> String {
        "FPR".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        Ok(Tnr.calc(input)?.map(|tnr| 1.0 - tnr))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        a < b
    }
}

/// 1 - TPR
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnr;

impl Metric for Fnr {
    fn name(&self) -> String {
        "FNR".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        Ok(Tpr.calc(input)?.map(|tpr| 1.0 - tpr))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        a < b
    }
}

/// Balanced classification rate: mean of TPR and TNR
#[derive(Debug, Clone, Copy, Default)]
pub struct Bcr;

impl Metric for Bcr {
    fn name(&self) -> String {
        "BCR".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let tnr = Tnr.calc(input)?;
        let tpr = Tpr.calc(input)?;
        Ok(tpr.zip(tnr).map(|(tpr, tnr)| (tpr + tnr) / 2.0))
    }
}

/// Matthews correlation coefficient of the binarized labels
#[derive(Debug, Clone, Copy, Default)]
pub struct Mcc;

impl Metric for Mcc {
    fn name(&self) -> String {
        "MCC".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        Ok(Some(input.confusion_matrix()?.mcc()))
    }
}
