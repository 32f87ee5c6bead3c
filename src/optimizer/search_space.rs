//! Hyperparameter values and grids

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl ParamValue {
    /// Numeric value; integers widen to float
    pub fn as_f64(&self, name: &str) -> Result<f64> {
        match self {
            ParamValue::Float(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            other => Err(KolosalError::invalid_param(name, other, "expected a number")),
        }
    }

    pub fn as_bool(&self, name: &str) -> Result<bool> {
        match self {
            ParamValue::Bool(v) => Ok(*v),
            other => Err(KolosalError::invalid_param(name, other, "expected a boolean")),
        }
    }

    pub fn as_usize(&self, name: &str) -> Result<usize> {
        match self {
            ParamValue::Int(v) if *v >= 0 => Ok(*v as usize),
            other => Err(KolosalError::invalid_param(name, other, "expected a non-negative integer")),
        }
    }

    pub fn as_u8(&self, name: &str) -> Result<u8> {
        match self {
            ParamValue::Int(v) => u8::try_from(*v)
                .map_err(|_| KolosalError::invalid_param(name, v, "expected an integer in 0..=255")),
            other => Err(KolosalError::invalid_param(name, other, "expected an integer")),
        }
    }
}

/// One point of a search space: parameter name to value
pub type TrialParams = BTreeMap<String, ParamValue>;

/// Exhaustive grid of candidate values per parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamGrid {
    params: BTreeMap<String, Vec<ParamValue>>,
}

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidates for `name`
    pub fn add<V: Into<ParamValue>>(mut self, name: impl Into<String>, values: Vec<V>) -> Self {
        self.params
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// First parameter given no candidate values, if any
    pub fn empty_parameter(&self) -> Option<&str> {
        self.params
            .iter()
            .find(|(_, values)| values.is_empty())
            .map(|(name, _)| name.as_str())
    }

    /// Number of candidates the grid expands to
    pub fn len(&self) -> usize {
        if self.params.is_empty() {
            return 1;
        }
        self.params.values().map(Vec::len).product()
    }

    /// Cartesian product in name order, last parameter varying fastest.
    /// An empty grid yields a single empty candidate.
    pub fn candidates(&self) -> Vec<TrialParams> {
        let mut out = vec![TrialParams::new()];
        for (name, values) in &self.params {
            out = out
                .into_iter()
                .flat_map(|partial| {
                    values.iter().map(move |v| {
                        let mut next = partial.clone();
                        next.insert(name.clone(), v.clone());
                        next
                    })
                })
                .collect();
        }
        out
    }
}
