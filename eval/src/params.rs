// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Ordered hyperparameter sets and their `k1=v1;k2=v2` result-row encoding
//!
//! `%`, `;` and `=` inside names or text values are written as `%25`, `%3B`
//! and `%3D` so that every set parses back to itself.

use crate::error::{FairnessError, Result};
use crate::frame::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter name to value mapping attached to one run; insertion order is kept
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    entries: Vec<(String, Value)>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding exactly one swept parameter
    pub fn single(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(name, value)
    }

    /// Builder-style insert; an existing key keeps its position
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Numeric parameter lookup, falling back to `default` when absent
    pub fn get_f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_f64()
                .ok_or_else(|| FairnessError::invalid_parameter(name, value, "expected a number")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of `self` with every entry of `overrides` applied on top
    pub fn merged(&self, overrides: &ParamSet) -> ParamSet {
        let mut merged = self.clone();
        for (name, value) in overrides.iter() {
            merged.set(name, value.clone());
        }
        merged
    }

    /// Encode as `k1=v1;k2=v2` (empty string for an empty set)
    pub fn to_field(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{}={}", escape(k), escape(&v.to_string())))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Decode the `k1=v1;k2=v2` form produced by [`ParamSet::to_field`]
    pub fn parse(field: &str) -> Result<ParamSet> {
        let mut params = ParamSet::new();
        if field.trim().is_empty() {
            return Ok(params);
        }
        for pair in field.split(';') {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| FairnessError::invalid_parameter(pair, "", "expected key=value"))?;
            params.set(unescape(name.trim())?, Value::parse(&unescape(value)?));
        }
        Ok(params)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '%' => out.push_str("%25"),
            ';' => out.push_str("%3B"),
            '=' => out.push_str("%3D"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let code = rest.get(pos + 1..pos + 3).unwrap_or("");
        let c = match code {
            "25" => '%',
            "3B" | "3b" => ';',
            "3D" | "3d" => '=',
            _ => return Err(FairnessError::invalid_parameter(text, "", "bad escape sequence")),
        };
        out.push(c);
        rest = &rest[pos + 3..];
    }
    out.push_str(rest);
    Ok(out)
}

impl fmt::Display for ParamSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_field())
    }
}
