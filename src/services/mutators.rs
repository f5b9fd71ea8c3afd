//! Ready-made mutators.
//!
//! The engine does not ship a search algorithm. These cover the trivial
//! cases: wrap a closure, or step one factor through a fixed list of values.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::MutationError;
use crate::domain::models::{FactorSuite, IterationRecord};
use crate::domain::ports::Mutator;

/// Adapts a synchronous closure into a [`Mutator`].
pub struct FnMutator<F> {
    f: F,
}

impl<F> FnMutator<F>
where
    F: Fn(&FactorSuite, &[Arc<IterationRecord>]) -> Result<FactorSuite, MutationError>
        + Send
        + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Mutator for FnMutator<F>
where
    F: Fn(&FactorSuite, &[Arc<IterationRecord>]) -> Result<FactorSuite, MutationError>
        + Send
        + Sync,
{
    async fn mutate(
        &self,
        current: &FactorSuite,
        history: &[Arc<IterationRecord>],
    ) -> Result<FactorSuite, MutationError> {
        (self.f)(current, history)
    }
}

/// Steps a single factor through an enumerated list of values.
///
/// The value for iteration `i + 1` is `values[i + 1]`, so the loop started on
/// `values[0]` visits each value once. Running past the end is an
/// [`MutationError::Exhausted`], which ends the loop with every value tried.
#[derive(Debug, Clone)]
pub struct FactorSweep {
    factor: String,
    values: Vec<Value>,
}

impl FactorSweep {
    pub fn new(
        factor: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<Value>>,
    ) -> Self {
        Self {
            factor: factor.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Configuration for the first iteration of the sweep.
    pub fn initial(&self, base: &FactorSuite) -> Result<FactorSuite, MutationError> {
        self.values
            .first()
            .map(|v| base.with_factor(self.factor.clone(), v.clone()))
            .ok_or_else(|| MutationError::Exhausted(format!("no values for '{}'", self.factor)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl Mutator for FactorSweep {
    async fn mutate(
        &self,
        current: &FactorSuite,
        history: &[Arc<IterationRecord>],
    ) -> Result<FactorSuite, MutationError> {
        let next = history.len();
        self.values
            .get(next)
            .map(|v| current.with_factor(self.factor.clone(), v.clone()))
            .ok_or_else(|| {
                MutationError::Exhausted(format!(
                    "all {} values of '{}' tried",
                    self.values.len(),
                    self.factor
                ))
            })
    }
}
