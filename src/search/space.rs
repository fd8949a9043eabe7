//! Hyperparameter space definition
//!
//! A [`ParamSpace`] describes the tunable parameters of an estimator. Searchers
//! either sample it (random search) or enumerate it exhaustively (grid search).

use crate::error::{PipetuneError, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of a tunable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamKind {
    /// Continuous float parameter
    Float { low: f64, high: f64, log_scale: bool },
    /// Integer parameter (inclusive bounds)
    Int { low: i64, high: i64 },
    /// Categorical parameter
    Categorical { choices: Vec<String> },
    /// Boolean parameter
    Bool,
}

/// A single named parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Float {
                low,
                high,
                log_scale: false,
            },
        }
    }

    /// Create a log-scale float parameter
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Float {
                low,
                high,
                log_scale: true,
            },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Int { low, high },
        }
    }

    /// Create a categorical parameter
    pub fn categorical(name: impl Into<String>, choices: Vec<&str>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Categorical {
                choices: choices.into_iter().map(String::from).collect(),
            },
        }
    }

    /// Create a boolean parameter
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Bool,
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParamValue {
        match &self.kind {
            ParamKind::Float {
                low,
                high,
                log_scale,
            } => {
                let val = if *log_scale {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    (rng.gen::<f64>() * (log_high - log_low) + log_low).exp()
                } else {
                    rng.gen::<f64>() * (high - low) + low
                };
                ParamValue::Float(val)
            }
            ParamKind::Int { low, high } => ParamValue::Int(rng.gen_range(*low..=*high)),
            ParamKind::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParamValue::Str(choices[idx].clone())
            }
            ParamKind::Bool => ParamValue::Bool(rng.gen()),
        }
    }

    /// All values of this parameter, for grid enumeration.
    ///
    /// Continuous float parameters cannot be enumerated and error.
    pub fn grid_values(&self) -> Result<Vec<ParamValue>> {
        match &self.kind {
            ParamKind::Float { low, high, .. } => Err(PipetuneError::InvalidParameter {
                name: self.name.clone(),
                value: format!("[{low}, {high}]"),
                reason: "continuous parameter cannot be enumerated for grid search".to_string(),
            }),
            ParamKind::Int { low, high } => Ok((*low..=*high).map(ParamValue::Int).collect()),
            ParamKind::Categorical { choices } => {
                Ok(choices.iter().cloned().map(ParamValue::Str).collect())
            }
            ParamKind::Bool => Ok(vec![ParamValue::Bool(false), ParamValue::Bool(true)]),
        }
    }
}

/// A sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Str(String),
    Bool(bool),
}

impl ParamValue {
    /// Get as float (ints widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// A concrete parameter assignment.
///
/// Ordered map so persisted records serialize deterministically.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Search space over estimator hyperparameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamSpace {
    specs: Vec<ParamSpec>,
}

impl ParamSpace {
    /// Create a new empty space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter spec
    pub fn add(mut self, spec: ParamSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(ParamSpec::float(name, low, high))
    }

    /// Add a log-scale float parameter
    pub fn log_float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(ParamSpec::log_float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(ParamSpec::int(name, low, high))
    }

    /// Add a categorical parameter
    pub fn categorical(self, name: impl Into<String>, choices: Vec<&str>) -> Self {
        self.add(ParamSpec::categorical(name, choices))
    }

    /// Add a boolean parameter
    pub fn boolean(self, name: impl Into<String>) -> Self {
        self.add(ParamSpec::boolean(name))
    }

    /// All parameter specs
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Sample a random assignment
    pub fn sample(&self, rng: &mut impl Rng) -> ParamSet {
        self.specs
            .iter()
            .map(|s| (s.name.clone(), s.sample(rng)))
            .collect()
    }

    /// Enumerate the full cartesian product of all parameter values.
    ///
    /// An empty space yields a single empty assignment (estimator defaults).
    pub fn grid(&self) -> Result<Vec<ParamSet>> {
        let mut sets: Vec<ParamSet> = vec![ParamSet::new()];
        for spec in &self.specs {
            let values = spec.grid_values()?;
            let mut next = Vec::with_capacity(sets.len() * values.len());
            for set in &sets {
                for value in &values {
                    let mut extended = set.clone();
                    extended.insert(spec.name.clone(), value.clone());
                    next.push(extended);
                }
            }
            sets = next;
        }
        Ok(sets)
    }
}
