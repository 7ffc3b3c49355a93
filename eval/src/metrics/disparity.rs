// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Group disparity metrics: protected vs. unprotected ratios and differences
//!
//! Ratios divide the protected rate by the unprotected rate and follow
//! [`rate_ratio`]: both zero gives 1.0, an unprotected rate of zero alone
//! gives 0.0. Differences subtract directly and have no special cases.

use super::{closer_to, Metric, MetricInput};
use crate::confusion::{self, is_unprotected, rate_ratio, safe_rate, Group};
use crate::error::{ensure_len, Result};
use crate::frame::Value;

/// Disparate impact: protected positive-prediction share over the unprotected share
#[derive(Debug, Clone, Copy, Default)]
pub struct DiBinary;

impl Metric for DiBinary {
    fn name(&self) -> String {
        "DIbinary".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        let (unprotected, protected) = confusion::positive_shares(
            input.predicted,
            input.sensitive_values()?,
            input.unprotected,
            input.positive,
        )?;
        Ok(Some(rate_ratio(protected, unprotected)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Disparate impact of every observed non-privileged value against the
/// privileged group, averaged
#[derive(Debug, Clone, Copy, Default)]
pub struct DiAvgAll;

impl Metric for DiAvgAll {
    fn name(&self) -> String {
        "DIavgall".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        let sensitive = input.sensitive_values()?;

        let (unprotected_share, _) = confusion::positive_shares(
            input.predicted,
            sensitive,
            input.unprotected,
            input.positive,
        )?;

        let mut values: Vec<&Value> = sensitive
            .iter()
            .filter(|v| !is_unprotected(v, input.unprotected))
            .collect();
        values.sort();
        values.dedup();

        if values.is_empty() {
            return Ok(Some(1.0));
        }

        let total: f64 = values
            .iter()
            .map(|&value| {
                let (mut positives, mut count) = (0, 0);
                for (pred, sens) in input.predicted.iter().zip(sensitive) {
                    if sens == value {
                        count += 1;
                        positives += (pred == input.positive) as usize;
                    }
                }
                rate_ratio(safe_rate(positives, count), unprotected_share)
            })
            .sum();
        Ok(Some(total / values.len() as f64))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Calders–Verwer score: 1 - (unprotected share - protected share)
#[derive(Debug, Clone, Copy, Default)]
pub struct Cv;

impl Metric for Cv {
    fn name(&self) -> String {
        "CV".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        let (unprotected, protected) = confusion::positive_shares(
            input.predicted,
            input.sensitive_values()?,
            input.unprotected,
            input.positive,
        )?;
        Ok(Some(1.0 - (unprotected - protected)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Equal opportunity: ratio of true positive rates
#[derive(Debug, Clone, Copy, Default)]
pub struct EqOppoTpRateRatio;

impl Metric for EqOppoTpRateRatio {
    fn name(&self) -> String {
        "EqOppo_tp_rate_ratio".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let counts = input.group_confusion()?;
        Ok(Some(rate_ratio(counts.tpr(Group::Protected), counts.tpr(Group::Unprotected))))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Equal opportunity: ratio of false positive rates.
///
/// The zero check is made on the unprotected rate, like the other ratios;
/// a zero rate and a zero false-positive count coincide whenever the rate is
/// defined.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqOppoFpRateRatio;

impl Metric for EqOppoFpRateRatio {
    fn name(&self) -> String {
        "EqOppo_fp_rate_ratio".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let counts = input.group_confusion()?;
        Ok(Some(rate_ratio(counts.fpr(Group::Protected), counts.fpr(Group::Unprotected))))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Equal opportunity: ratio of false negatives per group member
#[derive(Debug, Clone, Copy, Default)]
pub struct EqOppoFnRatio;

impl Metric for EqOppoFnRatio {
    fn name(&self) -> String {
        "EqOppo_fn_ratio".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let counts = input.group_confusion()?;
        Ok(Some(rate_ratio(
            counts.fn_share(Group::Protected),
            counts.fn_share(Group::Unprotected),
        )))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Equal opportunity: protected FPR - unprotected FPR
#[derive(Debug, Clone, Copy, Default)]
pub struct EqOppoFpDiff;

impl Metric for EqOppoFpDiff {
    fn name(&self) -> String {
        "EqOppo_fp_diff".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let counts = input.group_confusion()?;
        Ok(Some(counts.fpr(Group::Protected) - counts.fpr(Group::Unprotected)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(0.0, a, b)
    }
}

/// Equal opportunity: protected FNR - unprotected FNR
#[derive(Debug, Clone, Copy, Default)]
pub struct EqOppoFnDiff;

impl Metric for EqOppoFnDiff {
    fn name(&self) -> String {
        "EqOppo_fn_diff".to_string()
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let counts = input.group_confusion()?;
        Ok(Some(counts.fnr(Group::Protected) - counts.fnr(Group::Unprotected)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(0.0, a, b)
    }
}
