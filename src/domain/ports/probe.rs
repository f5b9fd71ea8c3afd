use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::models::FactorSuite;

/// Context handed to a probe for one invocation.
///
/// Cheap to clone: the configuration is shared.
#[derive(Debug, Clone)]
pub struct SampleContext {
    /// Run this sample belongs to.
    pub run_id: Uuid,
    /// Dispatch index. Warmup and measured samples are numbered separately.
    pub index: usize,
    pub warmup: bool,
    /// Configuration the probe should apply.
    pub configuration: Arc<FactorSuite>,
}

/// What a probe hands back on a completed invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutput {
    pub value: Value,
    /// Cost units consumed by this invocation, if the probe tracks cost.
    pub cost_units: Option<u64>,
}

impl ProbeOutput {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            cost_units: None,
        }
    }

    pub fn with_cost(mut self, cost_units: u64) -> Self {
        self.cost_units = Some(cost_units);
        self
    }
}

/// Port for the variable-outcome action under test (the "use case").
///
/// Returning `Err` or panicking never aborts a run: the sample executor turns
/// both into a failed outcome. Attach a failure category by returning a
/// [`CategorizedFailure`](crate::domain::errors::CategorizedFailure).
///
/// # Examples
///
/// ```no_run
/// use probatio::domain::ports::{Probe, ProbeOutput, SampleContext};
/// use async_trait::async_trait;
/// use anyhow::Result;
///
/// struct Echo;
///
/// #[async_trait]
/// impl Probe for Echo {
///     async fn invoke(&self, ctx: &SampleContext) -> Result<ProbeOutput> {
///         Ok(ProbeOutput::new(ctx.index as u64))
///     }
/// }
/// ```
#[async_trait]
pub trait Probe: Send + Sync {
    /// Perform the action once under `ctx.configuration`.
    async fn invoke(&self, ctx: &SampleContext) -> Result<ProbeOutput>;
}

/// Adapts an async closure into a [`Probe`].
pub struct FnProbe<F> {
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn(SampleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutput>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(SampleContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ProbeOutput>> + Send + 'static,
{
    async fn invoke(&self, ctx: &SampleContext) -> Result<ProbeOutput> {
        (self.f)(ctx.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Success evaluation
// ---------------------------------------------------------------------------

/// Verdict of a success criterion on one probe output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Pass,
    Fail { category: String, message: String },
}

impl Evaluation {
    pub fn fail(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fail {
            category: category.into(),
            message: message.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Port deciding whether a probe output counts as a success.
///
/// The engine never decides what "correct" means; this contract does.
pub trait SuccessCriterion: Send + Sync {
    fn evaluate(&self, output: &ProbeOutput) -> Evaluation;
}

/// Any output the probe returns without error is a success.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletesWithoutError;

impl SuccessCriterion for CompletesWithoutError {
    fn evaluate(&self, _output: &ProbeOutput) -> Evaluation {
        Evaluation::Pass
    }
}

/// Success when the output equals an expected value.
#[derive(Debug, Clone)]
pub struct ExpectEquals {
    expected: Value,
}

impl ExpectEquals {
    pub const CATEGORY: &'static str = "mismatch";

    pub fn new(expected: impl Into<Value>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl SuccessCriterion for ExpectEquals {
    fn evaluate(&self, output: &ProbeOutput) -> Evaluation {
        if output.value == self.expected {
            Evaluation::Pass
        } else {
            Evaluation::fail(
                Self::CATEGORY,
                format!("expected {}, got {}", self.expected, output.value),
            )
        }
    }
}

/// Success when a predicate over the output value holds.
pub struct Predicate<F> {
    category: String,
    f: F,
}

impl<F> Predicate<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    pub fn new(category: impl Into<String>, f: F) -> Self {
        Self {
            category: category.into(),
            f,
        }
    }
}

impl<F> SuccessCriterion for Predicate<F>
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn evaluate(&self, output: &ProbeOutput) -> Evaluation {
        if (self.f)(&output.value) {
            Evaluation::Pass
        } else {
            Evaluation::fail(
                self.category.clone(),
                format!("predicate rejected {}", output.value),
            )
        }
    }
}
