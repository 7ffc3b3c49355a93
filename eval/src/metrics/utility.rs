// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Utility metrics built on welfare and cost functions
//!
//! A [`WelfareFn`] maps non-class features, binarized actual/predicted
//! labels and the two group masks to one numeric outcome per instance of
//! each group. [`UtilityMetric`] holds the welfare and cost strategies a
//! metric was built with and does the binarize/partition step; the concrete
//! metrics only aggregate the resulting [`WelfarePair`].

use super::{closer_to, Metric, MetricInput};
use crate::confusion::{binarize, is_unprotected};
use crate::error::{ensure_len, FairnessError, Result};
use crate::frame::Frame;
use std::fmt;
use std::sync::Arc;

/// Inputs handed to a welfare or cost function
pub struct WelfareInput<'a> {
    pub nonclass: &'a Frame,
    pub actual: &'a [bool],
    pub predicted: &'a [bool],
    pub protected: &'a [bool],
    pub unprotected: &'a [bool],
}

impl WelfareInput<'_> {
    /// Apply `per_instance` to every index and split the results by group
    fn split(&self, per_instance: impl Fn(bool, bool) -> f64) -> WelfarePair {
        let mut pair = WelfarePair::default();
        for i in 0..self.actual.len() {
            let value = per_instance(self.actual[i], self.predicted[i]);
            if self.protected[i] {
                pair.protected.push(value);
            } else if self.unprotected[i] {
                pair.unprotected.push(value);
            }
        }
        pair
    }
}

/// Per-instance outcomes for the protected and unprotected groups
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WelfarePair {
    pub protected: Vec<f64>,
    pub unprotected: Vec<f64>,
}

/// A named, pure welfare or cost strategy
#[derive(Clone, Copy)]
pub struct WelfareFn {
    name: &'static str,
    func: fn(&WelfareInput<'_>) -> WelfarePair,
}

impl WelfareFn {
    pub const fn new(name: &'static str, func: fn(&WelfareInput<'_>) -> WelfarePair) -> Self {
        Self { name, func }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn apply(&self, input: &WelfareInput<'_>) -> WelfarePair {
        (self.func)(input)
    }
}

impl fmt::Debug for WelfareFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WelfareFn").field(&self.name).finish()
    }
}

/// 1 for a positive prediction, else 0
pub fn pos_rate(input: &WelfareInput<'_>) -> WelfarePair {
    input.split(|_, predicted| predicted as u8 as f64)
}

/// 1 for a correct prediction, else 0
pub fn accuracy(input: &WelfareInput<'_>) -> WelfarePair {
    input.split(|actual, predicted| (actual == predicted) as u8 as f64)
}

/// German credit cost matrix: 0 when correct, 1 for rejecting a good
/// applicant, `bad_accepted` for granting a loan to a bad one
fn credit_cost(actual: bool, predicted: bool, bad_accepted: f64) -> f64 {
    match (actual, predicted) {
        (a, p) if a == p => 0.0,
        (true, false) => 1.0,
        _ => bad_accepted,
    }
}

pub fn german_credit_payoffs(input: &WelfareInput<'_>) -> WelfarePair {
    input.split(|actual, predicted| credit_cost(actual, predicted, 5.0))
}

pub fn german_credit_payoffs_imbal(input: &WelfareInput<'_>) -> WelfarePair {
    input.split(|actual, predicted| credit_cost(actual, predicted, 20.0))
}

pub const POS_RATE: WelfareFn = WelfareFn::new("pos_rate", pos_rate);
pub const ACCURACY: WelfareFn = WelfareFn::new("accuracy", accuracy);
pub const GERMAN_CREDIT_PAYOFFS: WelfareFn =
    WelfareFn::new("german_credit_payoffs", german_credit_payoffs);
pub const GERMAN_CREDIT_PAYOFFS_IMBAL: WelfareFn =
    WelfareFn::new("german_credit_payoffs_imbal", german_credit_payoffs_imbal);

/// Monotone transform applied to each welfare value before aggregation
pub type Transform = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Welfare and cost strategies shared by the utility metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct UtilityMetric {
    welfare: Option<WelfareFn>,
    cost: Option<WelfareFn>,
}

impl UtilityMetric {
    pub fn new(welfare: Option<WelfareFn>, cost: Option<WelfareFn>) -> Self {
        Self { welfare, cost }
    }

    /// Binarize labels against the positive value, partition by the active
    /// attribute and run the welfare function
    pub fn calc_welfare(&self, metric: &str, input: &MetricInput<'_>) -> Result<WelfarePair> {
        let func = self.welfare.ok_or_else(|| FairnessError::MissingUtilityFunction {
            metric: metric.to_string(),
            kind: "welfare",
        })?;
        Self::evaluate(func, input)
    }

    /// Same as [`UtilityMetric::calc_welfare`] with the cost function
    pub fn calc_cost(&self, metric: &str, input: &MetricInput<'_>) -> Result<WelfarePair> {
        let func = self.cost.ok_or_else(|| FairnessError::MissingUtilityFunction {
            metric: metric.to_string(),
            kind: "cost",
        })?;
        Self::evaluate(func, input)
    }

    fn evaluate(func: WelfareFn, input: &MetricInput<'_>) -> Result<WelfarePair> {
        ensure_len("predictions", input.actual.len(), input.predicted.len())?;
        let sensitive = input.sensitive_values()?;
        let nonclass = input.nonclass_values()?;

        let actual = binarize(input.actual, input.positive);
        let predicted = binarize(input.predicted, input.positive);
        let unprotected: Vec<bool> =
            sensitive.iter().map(|s| is_unprotected(s, input.unprotected)).collect();
        let protected: Vec<bool> = unprotected.iter().map(|u| !u).collect();

        Ok(func.apply(&WelfareInput {
            nonclass,
            actual: &actual,
            predicted: &predicted,
            protected: &protected,
            unprotected: &unprotected,
        }))
    }
}

/// Optional transform followed by an optional `>= tau` threshold
#[derive(Clone, Default)]
struct Shaping {
    tau: Option<f64>,
    transform: Option<Transform>,
    label: Option<String>,
}

impl Shaping {
    fn apply(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .map(|&w| {
                let w = self.transform.as_ref().map_or(w, |t| t(w));
                match self.tau {
                    Some(tau) => (w >= tau) as u8 as f64,
                    None => w,
                }
            })
            .collect()
    }

    fn name(&self, prefix: &str, welfare: &WelfareFn) -> String {
        let mut name = format!("{}_{}", prefix, self.label.as_deref().unwrap_or(welfare.name()));
        if let Some(tau) = self.tau {
            name.push_str(&format!("_tau={}", tau));
        }
        name
    }
}

/// Demographic parity of welfare: |mean protected / mean unprotected|
#[derive(Clone)]
pub struct DemParWelf {
    welfare: WelfareFn,
    utility: UtilityMetric,
    shaping: Shaping,
}

impl DemParWelf {
    pub fn new(welfare: WelfareFn) -> Self {
        Self {
            welfare,
            utility: UtilityMetric::new(Some(welfare), None),
            shaping: Shaping::default(),
        }
    }

    pub fn with_cost(mut self, cost: WelfareFn) -> Self {
        self.utility = UtilityMetric::new(Some(self.welfare), Some(cost));
        self
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.shaping.tau = Some(tau);
        self
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.shaping.transform = Some(Arc::new(transform));
        self
    }

    /// Replace the welfare function name in the metric name
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.shaping.label = Some(label.into());
        self
    }
}

impl Metric for DemParWelf {
    fn name(&self) -> String {
        self.shaping.name("DemParWelf", &self.welfare)
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let pair = self.utility.calc_welfare(&self.name(), input)?;
        let protected = mean(&self.shaping.apply(&pair.protected));
        let unprotected = mean(&self.shaping.apply(&pair.unprotected));
        tracing::debug!("{}: protected={} unprotected={}", self.name(), protected, unprotected);
        Ok(Some((protected / unprotected).abs()))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Calders–Verwer score over welfare: 1 - (mean unprotected - mean protected)
#[derive(Clone)]
pub struct CvWelf {
    welfare: WelfareFn,
    utility: UtilityMetric,
    shaping: Shaping,
}

impl CvWelf {
    pub fn new(welfare: WelfareFn) -> Self {
        Self {
            welfare,
            utility: UtilityMetric::new(Some(welfare), None),
            shaping: Shaping::default(),
        }
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.shaping.tau = Some(tau);
        self
    }

    pub fn with_transform(
        mut self,
        transform: impl Fn(f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.shaping.transform = Some(Arc::new(transform));
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.shaping.label = Some(label.into());
        self
    }
}

impl Metric for CvWelf {
    fn name(&self) -> String {
        self.shaping.name("CVWelf", &self.welfare)
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let pair = self.utility.calc_welfare(&self.name(), input)?;
        let protected = mean(&self.shaping.apply(&pair.protected));
        let unprotected = mean(&self.shaping.apply(&pair.unprotected));
        Ok(Some(1.0 - (unprotected - protected)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        closer_to(1.0, a, b)
    }
}

/// Expected welfare over the pooled population
#[derive(Debug, Clone, Copy)]
pub struct ExpWelf {
    welfare: WelfareFn,
    utility: UtilityMetric,
}

impl ExpWelf {
    pub fn new(welfare: WelfareFn) -> Self {
        Self {
            welfare,
            utility: UtilityMetric::new(Some(welfare), None),
        }
    }
}

impl Metric for ExpWelf {
    fn name(&self) -> String {
        format!("ExpWelf_{}", self.welfare.name())
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let pair = self.utility.calc_welfare(&self.name(), input)?;
        let pooled: Vec<f64> = pair.protected.into_iter().chain(pair.unprotected).collect();
        Ok(Some(mean(&pooled)))
    }
}

/// Expected cost over the pooled population; lower is better
#[derive(Debug, Clone, Copy)]
pub struct ExpCost {
    cost: WelfareFn,
    utility: UtilityMetric,
}

impl ExpCost {
    pub fn new(cost: WelfareFn) -> Self {
        Self {
            cost,
            utility: UtilityMetric::new(None, Some(cost)),
        }
    }
}

impl Metric for ExpCost {
    fn name(&self) -> String {
        format!("ExpCost_{}", self.cost.name())
    }

    fn calc(&self, input: &MetricInput<'_>) -> Result<Option<f64>> {
        let pair = self.utility.calc_cost(&self.name(), input)?;
        let pooled: Vec<f64> = pair.protected.into_iter().chain(pair.unprotected).collect();
        Ok(Some(mean(&pooled)))
    }

    fn is_better_than(&self, a: f64, b: f64) -> bool {
        a < b
    }
}
