//! Factor suites: one point in the configuration space explored by
//! optimization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable mapping from factor name to value.
///
/// Children are derived with [`with_factor`](Self::with_factor) or
/// [`without_factor`](Self::without_factor); a suite is never changed in
/// place once shared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactorSuite {
    factors: BTreeMap<String, Value>,
}

impl FactorSuite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Self {
            factors: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// A new suite equal to this one with `name` set to `value`.
    #[must_use]
    pub fn with_factor(&self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut factors = self.factors.clone();
        factors.insert(name.into(), value.into());
        Self { factors }
    }

    /// A new suite equal to this one without `name`.
    #[must_use]
    pub fn without_factor(&self, name: &str) -> Self {
        let mut factors = self.factors.clone();
        factors.remove(name);
        Self { factors }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.factors.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.factors.iter()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

impl fmt::Display for FactorSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .factors
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
