// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Confusion statistics split by protected/unprotected membership
//!
//! Provides:
//! - [`ConfusionMatrix`]: population-level counts against a positive value
//! - [`GroupConfusion`]: the same counts split by a privileged-value partition
//! - [`safe_rate`] and [`rate_ratio`]: the zero-denominator conventions shared
//!   by every rate and ratio metric
//!
//! An instance is unprotected iff its sensitive value is one of the
//! privileged values; a label is positive iff it equals the positive value.

use crate::error::{ensure_len, Result};
use crate::frame::Value;
use serde::{Deserialize, Serialize};

/// `num / den`, or `0.0` when the denominator is zero (an undefined rate)
pub fn safe_rate(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Protected rate over unprotected rate.
///
/// Both zero gives 1.0 (the groups behave identically); an unprotected rate
/// of zero with a non-zero protected rate gives 0.0.
pub fn rate_ratio(protected_rate: f64, unprotected_rate: f64) -> f64 {
    if unprotected_rate == 0.0 && protected_rate == 0.0 {
        1.0
    } else if unprotected_rate > 0.0 {
        protected_rate / unprotected_rate
    } else {
        0.0
    }
}

pub fn is_unprotected(value: &Value, unprotected: &[Value]) -> bool {
    unprotected.contains(value)
}

/// `label == positive` for every label
pub fn binarize(labels: &[Value], positive: &Value) -> Vec<bool> {
    labels.iter().map(|l| l == positive).collect()
}

/// Which side of the privileged-value partition an instance falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Protected,
    Unprotected,
}

/// Population confusion matrix for a binarized classification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Count outcomes of `predicted` against `actual`
    pub fn from_predictions(
        actual: &[Value],
        predicted: &[Value],
        positive: &Value,
    ) -> Result<Self> {
        ensure_len("predictions", actual.len(), predicted.len())?;

        let mut matrix = Self::default();
        for (truth, pred) in actual.iter().zip(predicted) {
            match (truth == positive, pred == positive) {
                (true, true) => matrix.tp += 1,
                (false, false) => matrix.tn += 1,
                (false, true) => matrix.fp += 1,
                (true, false) => matrix.fn_ += 1,
            }
        }
        Ok(matrix)
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// Recall / sensitivity: TP / (TP + FN)
    pub fn true_positive_rate(&self) -> f64 {
        safe_rate(self.tp, self.tp + self.fn_)
    }

    /// Specificity: TN / (TN + FP)
    pub fn true_negative_rate(&self) -> f64 {
        safe_rate(self.tn, self.tn + self.fp)
    }

    /// Matthews Correlation Coefficient, 0.0 when any margin is empty
    pub fn mcc(&self) -> f64 {
        let tp = self.tp as f64;
        let tn = self.tn as f64;
        let fp = self.fp as f64;
        let fn_ = self.fn_ as f64;

        let numerator = tp * tn - fp * fn_;
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();

        if denominator == 0.0 {
            return 0.0;
        }
        numerator / denominator
    }
}

/// Confusion counts split by group membership
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfusion {
    pub tp_unprotected: usize,
    pub tp_protected: usize,
    pub tn_protected: usize,
    pub tn_unprotected: usize,
    pub fp_unprotected: usize,
    pub fp_protected: usize,
    pub fn_protected: usize,
    pub fn_unprotected: usize,
}

impl GroupConfusion {
    pub fn total(&self) -> usize {
        self.group_size(Group::Protected) + self.group_size(Group::Unprotected)
    }

    pub fn tp(&self, group: Group) -> usize {
        match group {
            Group::Protected => self.tp_protected,
            Group::Unprotected => self.tp_unprotected,
        }
    }

    pub fn tn(&self, group: Group) -> usize {
        match group {
            Group::Protected => self.tn_protected,
            Group::Unprotected => self.tn_unprotected,
        }
    }

    pub fn fp(&self, group: Group) -> usize {
        match group {
            Group::Protected => self.fp_protected,
            Group::Unprotected => self.fp_unprotected,
        }
    }

    pub fn fn_(&self, group: Group) -> usize {
        match group {
            Group::Protected => self.fn_protected,
            Group::Unprotected => self.fn_unprotected,
        }
    }

    pub fn group_size(&self, group: Group) -> usize {
        self.tp(group) + self.tn(group) + self.fp(group) + self.fn_(group)
    }

    /// TP / (TP + FN) within the group
    pub fn tpr(&self, group: Group) -> f64 {
        safe_rate(self.tp(group), self.tp(group) + self.fn_(group))
    }

    /// FP / (FP + TN) within the group
    pub fn fpr(&self, group: Group) -> f64 {
        safe_rate(self.fp(group), self.fp(group) + self.tn(group))
    }

    /// FN / (FN + TP) within the group
    pub fn fnr(&self, group: Group) -> f64 {
        safe_rate(self.fn_(group), self.fn_(group) + self.tp(group))
    }

    /// FN / group size
    pub fn fn_share(&self, group: Group) -> f64 {
        safe_rate(self.fn_(group), self.group_size(group))
    }
}

/// Count TP/TN/FP/FN separately for the protected and unprotected groups.
///
/// Fails with `ShapeMismatch` when the three vectors differ in length.
pub fn confusion_counts(
    actual: &[Value],
    predicted: &[Value],
    sensitive: &[Value],
    unprotected: &[Value],
    positive: &Value,
) -> Result<GroupConfusion> {
    ensure_len("predictions", actual.len(), predicted.len())?;
    ensure_len("sensitive values", actual.len(), sensitive.len())?;

    let mut counts = GroupConfusion::default();
    for ((truth, pred), sens) in actual.iter().zip(predicted).zip(sensitive) {
        let unprot = is_unprotected(sens, unprotected);
        let slot = match (truth == positive, pred == positive, unprot) {
            (true, true, true) => &mut counts.tp_unprotected,
            (true, true, false) => &mut counts.tp_protected,
            (false, false, false) => &mut counts.tn_protected,
            (false, false, true) => &mut counts.tn_unprotected,
            (false, true, true) => &mut counts.fp_unprotected,
            (false, true, false) => &mut counts.fp_protected,
            (true, false, false) => &mut counts.fn_protected,
            (true, false, true) => &mut counts.fn_unprotected,
        };
        *slot += 1;
    }
    Ok(counts)
}

/// Share of positive predictions in the unprotected and protected groups,
/// returned in that order
pub fn positive_shares(
    predicted: &[Value],
    sensitive: &[Value],
    unprotected: &[Value],
    positive: &Value,
) -> Result<(f64, f64)> {
    ensure_len("sensitive values", predicted.len(), sensitive.len())?;

    let (mut unprot_pos, mut unprot_total, mut prot_pos, mut prot_total) = (0, 0, 0, 0);
    for (pred, sens) in predicted.iter().zip(sensitive) {
        let is_pos = pred == positive;
        if is_unprotected(sens, unprotected) {
            unprot_total += 1;
            unprot_pos += is_pos as usize;
        } else {
            prot_total += 1;
            prot_pos += is_pos as usize;
        }
    }
    Ok((safe_rate(unprot_pos, unprot_total), safe_rate(prot_pos, prot_total)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[i32]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    fn texts(values: &[&str]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    #[test]
    fn test_group_counts_scenario() {
        let actual = nums(&[1, 1, 0, 0]);
        let predicted = nums(&[1, 0, 0, 0]);
        let sensitive = texts(&["A", "A", "B", "B"]);

        let unprotected = texts(&["A"]);
        let counts =
            confusion_counts(&actual, &predicted, &sensitive, &unprotected, &Value::from(1))
                .unwrap();

        assert_eq!(counts.tp_unprotected, 1);
        assert_eq!(counts.fn_unprotected, 1);
        assert_eq!(counts.tn_protected, 2);
        assert_eq!(counts.tp_protected + counts.fn_protected + counts.fp_protected, 0);
        assert!((counts.tpr(Group::Unprotected) - 0.5).abs() < 1e-12);
        // Protected group has no actual positives: undefined rate resolves to 0.0
        assert_eq!(counts.tpr(Group::Protected), 0.0);
    }

    #[test]
    fn test_counts_sum_to_length_for_any_partition() {
        let actual = texts(&["y", "n", "y", "maybe", "n", "y", "n"]);
        let predicted = texts(&["n", "n", "y", "y", "y", "maybe", "n"]);
        let sensitive = texts(&["a", "b", "c", "a", "b", "c", "d"]);
        let partitions: Vec<Vec<Value>> = vec![
            vec![],
            texts(&["a"]),
            texts(&["a", "c"]),
            texts(&["a", "b", "c", "d"]),
            texts(&["zzz"]),
        ];
        for unprotected in &partitions {
            let counts =
                confusion_counts(&actual, &predicted, &sensitive, unprotected, &Value::from("y"))
                    .unwrap();
            assert_eq!(counts.total(), actual.len());
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let err = confusion_counts(
            &nums(&[1, 0]),
            &nums(&[1]),
            &texts(&["a", "b"]),
            &texts(&["a"]),
            &Value::from(1),
        )
        .unwrap_err();
        assert_eq!(err.code(), "shape_mismatch");

        let err =
            positive_shares(&nums(&[1, 0]), &texts(&["a"]), &[], &Value::from(1)).unwrap_err();
        assert_eq!(err.code(), "shape_mismatch");
    }

    #[test]
    fn test_rate_ratio_conventions() {
        assert_eq!(rate_ratio(0.0, 0.0), 1.0);
        assert_eq!(rate_ratio(0.4, 0.0), 0.0);
        assert!((rate_ratio(0.25, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(safe_rate(3, 0), 0.0);
    }

    #[test]
    fn test_population_matrix() {
        let actual = nums(&[1, 1, 0, 0]);
        let predicted = nums(&[1, 0, 1, 0]);
        let cm = ConfusionMatrix::from_predictions(&actual, &predicted, &Value::from(1)).unwrap();
        assert_eq!((cm.tp, cm.tn, cm.fp, cm.fn_), (1, 1, 1, 1));
        assert_eq!(cm.total(), 4);
        assert!(cm.mcc().abs() < 1e-12);

        let perfect = ConfusionMatrix::from_predictions(&actual, &actual, &Value::from(1)).unwrap();
        assert!((perfect.mcc() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_positive_shares() {
        let predicted = nums(&[1, 1, 0, 1, 0, 0]);
        let sensitive = texts(&["m", "m", "m", "f", "f", "f"]);
        let (unprot, prot) =
            positive_shares(&predicted, &sensitive, &texts(&["m"]), &Value::from(1)).unwrap();
        assert!((unprot - 2.0 / 3.0).abs() < 1e-12);
        assert!((prot - 1.0 / 3.0).abs() < 1e-12);
    }
}
