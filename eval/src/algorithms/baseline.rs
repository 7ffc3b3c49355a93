// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Baselines that look only at the training labels
//!
//! - Random: Bernoulli draw per test row at the empirical positive rate
//! - Majority: always the most frequent training label

use super::{Algorithm, RunInput, RunOutput};
use crate::error::{FairnessError, Result};
use crate::frame::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// Random baseline
///
/// Each test row independently gets the positive value with probability
/// equal to the training positive rate; otherwise a label drawn from the
/// non-positive training labels. The realised positive count is random.
#[derive(Debug, Clone)]
pub struct Random {
    seed: u64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Algorithm for Random {
    fn name(&self) -> String {
        "Random".to_string()
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
        let labels = input.train_labels()?;
        if labels.is_empty() {
            return Err(FairnessError::algorithm(self.name(), "empty training set"));
        }

        let positive = input.positive_value;
        let negatives: Vec<&Value> = labels.iter().filter(|l| *l != positive).collect();
        let positive_rate = (labels.len() - negatives.len()) as f64 / labels.len() as f64;

        // Reseeded per trial
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(input.trial as u64));
        let predictions = (0..input.test.n_rows())
            .map(|_| {
                let draw: f64 = rng.gen();
                if draw < positive_rate || negatives.is_empty() {
                    positive.clone()
                } else {
                    negatives[rng.gen_range(0..negatives.len())].clone()
                }
            })
            .collect();

        Ok(RunOutput::predictions(predictions))
    }
}

/// Majority class baseline
#[derive(Debug, Clone, Copy, Default)]
pub struct Majority;

impl Algorithm for Majority {
    fn name(&self) -> String {
        "Majority".to_string()
    }

    fn run(&self, input: &RunInput<'_>) -> Result<RunOutput> {
        let mut counts: HashMap<&Value, usize> = HashMap::new();
        for label in input.train_labels()? {
            *counts.entry(label).or_insert(0) += 1;
        }

        // Ties go to the smallest label so the choice is deterministic
        let majority = counts
            .into_iter()
            .max_by(|(a, ca), (b, cb)| ca.cmp(cb).then_with(|| b.cmp(a)))
            .map(|(label, _)| label.clone())
            .ok_or_else(|| FairnessError::algorithm(self.name(), "empty training set"))?;

        Ok(RunOutput::predictions(vec![majority; input.test.n_rows()]))
    }
}
