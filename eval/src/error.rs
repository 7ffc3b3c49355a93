// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Error types shared by the metric, algorithm and dataset layers.
//!
//! Zero denominators are not errors: rates resolve them to `0.0` (see
//! [`crate::confusion::safe_rate`]) and the ratio metrics apply their own
//! conventions on top.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FairnessError>;

/// Errors raised while evaluating a single unit of work or loading data.
#[derive(Debug, Error)]
pub enum FairnessError {
    /// Label, prediction and sensitive vectors disagree in length.
    #[error("shape mismatch in {context}: expected {expected} rows, found {found}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    /// A class, sensitive or non-class column is absent.
    #[error("unknown attribute '{0}'")]
    MissingAttribute(String),

    /// A classifier was handed a feature it cannot interpret as a number.
    #[error("column '{column}' is not numeric")]
    NonNumeric { column: String },

    /// An algorithm could not fit or predict.
    #[error("{algorithm} failed: {message}")]
    AlgorithmFailure { algorithm: String, message: String },

    #[error("invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    /// A utility metric was built without the welfare or cost strategy it needs.
    #[error("{metric} has no {kind} function")]
    MissingUtilityFunction { metric: String, kind: &'static str },

    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FairnessError {
    pub fn shape_mismatch(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::ShapeMismatch {
            context: context.into(),
            expected,
            found,
        }
    }

    pub fn algorithm(algorithm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AlgorithmFailure {
            algorithm: algorithm.into(),
            message: message.into(),
        }
    }

    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Short code used in log fields and the run summary.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::MissingAttribute(_) => "missing_attribute",
            Self::NonNumeric { .. } => "non_numeric",
            Self::AlgorithmFailure { .. } => "algorithm_failure",
            Self::InvalidParameter { .. } => "invalid_parameter",
            Self::MissingUtilityFunction { .. } => "missing_utility_function",
            Self::InvalidDataset(_) => "invalid_dataset",
            Self::Io(_) => "io_error",
            Self::Csv(_) => "csv_error",
            Self::Json(_) => "json_error",
        }
    }
}

/// Fail with [`FairnessError::ShapeMismatch`] unless `found == expected`.
pub fn ensure_len(context: &str, expected: usize, found: usize) -> Result<()> {
    if expected == found {
        Ok(())
    } else {
        Err(FairnessError::shape_mismatch(context, expected, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("labels", 3, 3).is_ok());
        let err = ensure_len("predictions", 3, 2).unwrap_err();
        assert_eq!(err.code(), "shape_mismatch");
        assert!(err.to_string().contains("expected 3 rows, found 2"));
    }

    #[test]
    fn test_algorithm_failure_message() {
        let err = FairnessError::algorithm("SVM", "single class");
        assert_eq!(err.to_string(), "SVM failed: single class");
    }
}
