// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Dataset loading, data representations and train/test splits
//!
//! A [`Dataset`] is a raw frame plus its [`DatasetConfig`]. [`ProcessedData`]
//! derives the three representations every benchmark works with:
//! - `original`: the raw frame plus the joint sensitive attribute
//! - `numerical`: class binarised to 1/0, categorical features one-hot encoded
//! - `numerical-binsensitive`: numerical, with every sensitive attribute
//!   binarised to 1 (privileged) / 0

use crate::error::{FairnessError, Result};
use crate::frame::{Frame, Value};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

pub const TAG_ORIGINAL: &str = "original";
pub const TAG_NUMERICAL: &str = "numerical";
pub const TAG_NUMERICAL_BINSENSITIVE: &str = "numerical-binsensitive";

/// Every representation [`ProcessedData`] materialises, in report order
pub const TAGS: [&str; 3] = [TAG_ORIGINAL, TAG_NUMERICAL, TAG_NUMERICAL_BINSENSITIVE];

/// Configuration for loading a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    /// CSV file with a header row
    #[serde(default)]
    pub path: Option<PathBuf>,
    pub class_attribute: String,
    pub positive_class: Value,
    pub sensitive_attributes: Vec<String>,
    /// Privileged ("unprotected") values per sensitive attribute
    pub privileged_values: BTreeMap<String, Vec<Value>>,
    /// Feature columns to keep besides the class and sensitive attributes;
    /// empty keeps everything
    #[serde(default)]
    pub features: Vec<String>,
}

impl DatasetConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensitive_attributes.is_empty() {
            return Err(FairnessError::InvalidDataset(format!(
                "{}: no sensitive attributes",
                self.name
            )));
        }
        for attribute in &self.sensitive_attributes {
            match self.privileged_values.get(attribute) {
                Some(values) if !values.is_empty() => {}
                _ => {
                    return Err(FairnessError::InvalidDataset(format!(
                        "{}: no privileged values for '{}'",
                        self.name, attribute
                    )))
                }
            }
            if attribute == &self.class_attribute {
                return Err(FairnessError::InvalidDataset(format!(
                    "{}: '{}' is both class and sensitive attribute",
                    self.name, attribute
                )));
            }
        }
        Ok(())
    }

    /// Configuration of the generated credit-scoring dataset
    pub fn synthetic() -> Self {
        Self {
            name: "german-synthetic".to_string(),
            path: None,
            class_attribute: "credit".to_string(),
            positive_class: Value::from("good"),
            sensitive_attributes: vec!["sex".to_string(), "age".to_string()],
            privileged_values: BTreeMap::from([
                ("sex".to_string(), vec![Value::from("male")]),
                ("age".to_string(), vec![Value::from("adult")]),
            ]),
            features: Vec::new(),
        }
    }

    /// Name of the combined attribute, present only with several sensitive attributes
    pub fn joint_attribute(&self) -> Option<String> {
        (self.sensitive_attributes.len() > 1).then(|| self.sensitive_attributes.join("-"))
    }
}

/// A loaded dataset ready for processing
#[derive(Debug, Clone)]
pub struct Dataset {
    pub config: DatasetConfig,
    pub frame: Frame,
}

impl Dataset {
    /// Load the CSV file named by `config.path`
    pub fn load_csv(config: DatasetConfig) -> Result<Self> {
        let path = config
            .path
            .clone()
            .ok_or_else(|| {
                FairnessError::InvalidDataset(format!("{}: no CSV path configured", config.name))
            })?;
        tracing::info!("Loading dataset {} from {}", config.name, path.display());
        let frame = Frame::read_csv(&path)?;
        Self::from_frame(config, frame)
    }

    /// Validate `frame` against `config` and keep only the configured columns
    pub fn from_frame(config: DatasetConfig, frame: Frame) -> Result<Self> {
        config.validate()?;
        for column in std::iter::once(&config.class_attribute)
            .chain(&config.sensitive_attributes)
            .chain(&config.features)
        {
            if !frame.has_column(column) {
                return Err(FairnessError::MissingAttribute(column.clone()));
            }
        }
        if frame.n_rows() == 0 {
            return Err(FairnessError::InvalidDataset(format!("{}: no rows", config.name)));
        }

        let frame = if config.features.is_empty() {
            frame
        } else {
            let dropped: Vec<String> = frame
                .columns()
                .iter()
                .filter(|c| {
                    **c != config.class_attribute
                        && !config.sensitive_attributes.contains(*c)
                        && !config.features.contains(*c)
                })
                .cloned()
                .collect();
            frame.drop_columns(&dropped)
        };

        Ok(Self { config, frame })
    }

    /// Generated credit-scoring data with `sex` and `age` as sensitive attributes
    pub fn synthetic(size: usize, seed: u64) -> Result<Self> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let housing_options = ["own", "rent", "free"];

        let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(size); 6];
        for _ in 0..size {
            let male = rng.gen_bool(0.6);
            let adult = rng.gen_bool(0.8);
            let duration = rng.gen_range(6..=60) as f64;
            let amount = rng.gen_range(250..=15000) as f64;
            let housing = housing_options[rng.gen_range(0..housing_options.len())];

            let mut good = 0.75 - duration / 200.0 - amount / 60000.0;
            if housing == "own" {
                good += 0.1;
            }
            if !adult {
                good -= 0.1;
            }
            if !male {
                good -= 0.05;
            }
            let credit = if rng.gen_bool(good.clamp(0.05, 0.95)) { "good" } else { "bad" };

            let row = [
                Value::Num(duration),
                Value::Num(amount),
                Value::from(housing),
                Value::from(if male { "male" } else { "female" }),
                Value::from(if adult { "adult" } else { "young" }),
                Value::from(credit),
            ];
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let names = ["duration", "amount", "housing", "sex", "age", "credit"];
        let frame = Frame::new(names.iter().map(|n| n.to_string()).collect(), columns)?;

        Ok(Self {
            config: DatasetConfig::synthetic(),
            frame,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn class_attribute(&self) -> &str {
        &self.config.class_attribute
    }

    /// Sensitive attributes followed by the joint attribute, if any
    pub fn sensitive_attributes_with_joint(&self) -> Vec<String> {
        let mut attributes = self.config.sensitive_attributes.clone();
        attributes.extend(self.config.joint_attribute());
        attributes
    }

    pub fn positive_value(&self, tag: &str) -> Value {
        if tag == TAG_ORIGINAL {
            self.config.positive_class.clone()
        } else {
            Value::Num(1.0)
        }
    }

    /// Privileged values per attribute (joint included) as seen under `tag`
    pub fn privileged_values_with_joint(&self, tag: &str) -> HashMap<String, Vec<Value>> {
        if tag == TAG_NUMERICAL_BINSENSITIVE {
            return self
                .sensitive_attributes_with_joint()
                .into_iter()
                .map(|attribute| (attribute, vec![Value::Num(1.0)]))
                .collect();
        }

        let mut privileged: HashMap<String, Vec<Value>> = self
            .config
            .privileged_values
            .iter()
            .map(|(attribute, values)| (attribute.clone(), values.clone()))
            .collect();
        if let Some(joint) = self.config.joint_attribute() {
            let first: Vec<String> = self
                .config
                .sensitive_attributes
                .iter()
                .filter_map(|a| self.config.privileged_values.get(a).and_then(|v| v.first()))
                .map(Value::to_string)
                .collect();
            privileged.insert(joint, vec![Value::from(first.join("-"))]);
        }
        privileged
    }

    pub fn results_filename(&self, dir: &Path, attribute: &str, tag: &str) -> PathBuf {
        dir.join(format!("{}_{}_{}.csv", self.name(), attribute, tag))
    }

    pub fn param_results_filename(
        &self,
        dir: &Path,
        attribute: &str,
        tag: &str,
        algorithm: &str,
    ) -> PathBuf {
        dir.join(format!("{}_{}_{}_{}.csv", self.name(), attribute, tag, algorithm))
    }
}

/// One trial's train/test frames for one representation
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Frame,
    pub test: Frame,
}

/// Train/test splits per tag, `num_trials` each
pub type TrainTestSplits = BTreeMap<&'static str, Vec<Split>>;

/// The three data representations of one dataset
#[derive(Debug, Clone)]
pub struct ProcessedData {
    frames: BTreeMap<&'static str, Frame>,
    sensitive_attributes: Vec<String>,
}

impl ProcessedData {
    pub fn new(dataset: &Dataset) -> Result<Self> {
        let config = &dataset.config;
        let sensitive_attributes = dataset.sensitive_attributes_with_joint();

        let original = match config.joint_attribute() {
            Some(joint) => {
                let columns: Vec<&[Value]> = config
                    .sensitive_attributes
                    .iter()
                    .map(|a| dataset.frame.column(a))
                    .collect::<Result<_>>()?;
                let values = (0..dataset.frame.n_rows())
                    .map(|i| {
                        let parts: Vec<String> = columns.iter().map(|c| c[i].to_string()).collect();
                        Value::from(parts.join("-"))
                    })
                    .collect();
                dataset.frame.clone().with_column(&joint, values)?
            }
            None => dataset.frame.clone(),
        };

        let numerical = numerical_frame(
            &original,
            &config.class_attribute,
            &config.positive_class,
            &sensitive_attributes,
        )?;

        let privileged = dataset.privileged_values_with_joint(TAG_ORIGINAL);
        let mut binsensitive = numerical.clone();
        for attribute in &sensitive_attributes {
            let unprotected = privileged.get(attribute).map(Vec::as_slice).unwrap_or(&[]);
            let values = binsensitive
                .column(attribute)?
                .iter()
                .map(|v| Value::Num(if unprotected.contains(v) { 1.0 } else { 0.0 }))
                .collect();
            binsensitive = binsensitive.with_column(attribute, values)?;
        }

        let frames = BTreeMap::from([
            (TAG_ORIGINAL, original),
            (TAG_NUMERICAL, numerical),
            (TAG_NUMERICAL_BINSENSITIVE, binsensitive),
        ]);
        Ok(Self {
            frames,
            sensitive_attributes,
        })
    }

    pub fn frame(&self, tag: &str) -> Option<&Frame> {
        self.frames.get(tag)
    }

    /// Distinct observed values of every sensitive attribute under `tag`
    pub fn sensitive_values(&self, tag: &str) -> Result<HashMap<String, Vec<Value>>> {
        let frame = self
            .frame(tag)
            .ok_or_else(|| {
                FairnessError::InvalidDataset(format!("unknown data representation '{}'", tag))
            })?;
        self.sensitive_attributes
            .iter()
            .map(|a| Ok((a.clone(), frame.unique_values(a)?)))
            .collect()
    }

    /// One shuffled permutation per trial (seeded with `seed + trial`),
    /// applied to every representation so the tags share their rows
    pub fn create_train_test_splits(
        &self,
        num_trials: usize,
        train_fraction: f64,
        seed: u64,
    ) -> Result<TrainTestSplits> {
        if !(train_fraction > 0.0 && train_fraction < 1.0) {
            return Err(FairnessError::invalid_parameter(
                "train_fraction",
                train_fraction,
                "must lie in (0, 1)",
            ));
        }
        let n_rows = self.frames.values().next().map_or(0, Frame::n_rows);
        let n_train = ((n_rows as f64) * train_fraction).round() as usize;

        let mut splits: TrainTestSplits = self
            .frames
            .keys()
            .map(|&tag| (tag, Vec::with_capacity(num_trials)))
            .collect();
        for trial in 0..num_trials {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(trial as u64));
            let mut order: Vec<usize> = (0..n_rows).collect();
            order.shuffle(&mut rng);
            let (train_rows, test_rows) = order.split_at(n_train.min(n_rows));

            for (tag, frame) in &self.frames {
                if let Some(trials) = splits.get_mut(tag) {
                    trials.push(Split {
                        train: frame.select_rows(train_rows),
                        test: frame.select_rows(test_rows),
                    });
                }
            }
        }
        Ok(splits)
    }
}

/// Binarise the class and one-hot encode non-sensitive text features
fn numerical_frame(
    frame: &Frame,
    class_attribute: &str,
    positive: &Value,
    sensitive: &[String],
) -> Result<Frame> {
    let mut columns = Vec::with_capacity(frame.n_cols());
    let mut data = Vec::with_capacity(frame.n_cols());

    for name in frame.columns() {
        let values = frame.column(name)?;
        if name == class_attribute {
            columns.push(name.clone());
            data.push(values.iter().map(|v| indicator(v == positive)).collect());
        } else if sensitive.contains(name) || frame.is_numeric_column(name)? {
            columns.push(name.clone());
            data.push(values.to_vec());
        } else {
            for category in frame.unique_values(name)? {
                columns.push(format!("{}_{}", name, category));
                data.push(values.iter().map(|v| indicator(*v == category)).collect());
            }
        }
    }
    Frame::new(columns, data)
}

fn indicator(flag: bool) -> Value {
    Value::Num(if flag { 1.0 } else { 0.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(housing: &str, amount: f64, sex: &str, age: &str, credit: &str) -> Vec<Value> {
        vec![housing.into(), Value::Num(amount), sex.into(), age.into(), credit.into()]
    }

    fn small() -> Dataset {
        let frame = Frame::from_rows(
            vec!["housing".into(), "amount".into(), "sex".into(), "age".into(), "credit".into()],
            vec![
                row("own", 100.0, "male", "adult", "good"),
                row("rent", 250.0, "female", "adult", "bad"),
                row("own", 80.0, "female", "young", "good"),
                row("free", 400.0, "male", "young", "bad"),
            ],
        )
        .unwrap();
        Dataset::from_frame(DatasetConfig::synthetic(), frame).unwrap()
    }

    #[test]
    fn test_joint_attribute_and_privileged_values() {
        let dataset = small();
        assert_eq!(dataset.sensitive_attributes_with_joint(), vec!["sex", "age", "sex-age"]);

        let privileged = dataset.privileged_values_with_joint(TAG_ORIGINAL);
        assert_eq!(privileged["sex-age"], vec![Value::from("male-adult")]);
        let binsensitive = dataset.privileged_values_with_joint(TAG_NUMERICAL_BINSENSITIVE);
        assert_eq!(binsensitive["sex-age"], vec![Value::Num(1.0)]);

        assert_eq!(dataset.positive_value(TAG_ORIGINAL), Value::from("good"));
        assert_eq!(dataset.positive_value(TAG_NUMERICAL), Value::Num(1.0));
    }

    #[test]
    fn test_representations() {
        let processed = ProcessedData::new(&small()).unwrap();

        let original = processed.frame(TAG_ORIGINAL).unwrap();
        assert_eq!(original.column("sex-age").unwrap()[2], Value::from("female-young"));

        let numerical = processed.frame(TAG_NUMERICAL).unwrap();
        assert_eq!(
            numerical.columns(),
            &[
                "housing_free",
                "housing_own",
                "housing_rent",
                "amount",
                "sex",
                "age",
                "credit",
                "sex-age",
            ]
        );
        let credit: Vec<f64> =
            numerical.column("credit").unwrap().iter().filter_map(Value::as_f64).collect();
        assert_eq!(credit, vec![1.0, 0.0, 1.0, 0.0]);
        assert_eq!(numerical.column("housing_own").unwrap()[0], Value::Num(1.0));
        assert_eq!(numerical.column("sex").unwrap()[0], Value::from("male"));

        let binsensitive = processed.frame(TAG_NUMERICAL_BINSENSITIVE).unwrap();
        let joint: Vec<f64> =
            binsensitive.column("sex-age").unwrap().iter().filter_map(Value::as_f64).collect();
        assert_eq!(joint, vec![1.0, 0.0, 0.0, 0.0]);

        let values = processed.sensitive_values(TAG_NUMERICAL_BINSENSITIVE).unwrap();
        assert_eq!(values["sex"], vec![Value::Num(0.0), Value::Num(1.0)]);
    }

    #[test]
    fn test_splits_share_rows_across_tags_and_are_seeded() {
        let dataset = Dataset::synthetic(30, 5).unwrap();
        let processed = ProcessedData::new(&dataset).unwrap();
        let splits = processed.create_train_test_splits(3, 2.0 / 3.0, 42).unwrap();
        assert_eq!(splits.len(), 3);

        for trials in splits.values() {
            assert_eq!(trials.len(), 3);
            assert_eq!(trials[0].train.n_rows(), 20);
            assert_eq!(trials[0].test.n_rows(), 10);
        }
        let original = &splits[TAG_ORIGINAL][1];
        let numerical = &splits[TAG_NUMERICAL][1];
        assert_eq!(
            original.test.column("amount").unwrap(),
            numerical.test.column("amount").unwrap()
        );

        let again = processed.create_train_test_splits(3, 2.0 / 3.0, 42).unwrap();
        assert_eq!(
            again[TAG_ORIGINAL][2].test.column("amount").unwrap(),
            splits[TAG_ORIGINAL][2].test.column("amount").unwrap()
        );
        assert!(processed.create_train_test_splits(1, 1.0, 42).is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = DatasetConfig::synthetic();
        config.privileged_values.remove("age");
        assert_eq!(config.validate().unwrap_err().code(), "invalid_dataset");

        let frame = Dataset::synthetic(5, 1).unwrap().frame.drop_columns(&["sex"]);
        let err = Dataset::from_frame(DatasetConfig::synthetic(), frame).unwrap_err();
        assert_eq!(err.code(), "missing_attribute");
    }

    #[test]
    fn test_feature_whitelist_and_filenames() {
        let mut config = DatasetConfig::synthetic();
        config.features = vec!["amount".to_string()];
        let frame = Dataset::synthetic(10, 2).unwrap().frame;
        let dataset = Dataset::from_frame(config, frame).unwrap();
        assert_eq!(dataset.frame.columns(), &["amount", "sex", "age", "credit"]);

        let path = dataset.results_filename(Path::new("results"), "sex", TAG_NUMERICAL);
        assert_eq!(path, Path::new("results/german-synthetic_sex_numerical.csv"));
        let path =
            dataset.param_results_filename(Path::new("results"), "sex", TAG_NUMERICAL, "SVM");
        assert_eq!(path, Path::new("results/german-synthetic_sex_numerical_SVM.csv"));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = DatasetConfig::synthetic();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: DatasetConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.positive_class, Value::from("good"));
        assert_eq!(parsed.privileged_values["sex"], vec![Value::from("male")]);
    }
}
