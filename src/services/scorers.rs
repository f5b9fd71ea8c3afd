//! Ready-made scorers.

use std::sync::Arc;

use crate::domain::errors::ScoringError;
use crate::domain::models::{FactorSuite, Statistics};
use crate::domain::ports::Scorer;

/// Scores a configuration by its observed success rate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuccessRateScorer;

impl Scorer for SuccessRateScorer {
    fn score(
        &self,
        statistics: &Statistics,
        _configuration: &FactorSuite,
    ) -> Result<f64, ScoringError> {
        if statistics.is_empty() {
            return Err(ScoringError::Failed(
                "no measured samples to score".to_string(),
            ));
        }
        Ok(statistics.observed_rate)
    }

    fn name(&self) -> &str {
        "success_rate"
    }
}

/// Scores by the lower confidence bound, favouring configurations whose rate
/// is both high and well supported by samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowerBoundScorer;

impl Scorer for LowerBoundScorer {
    fn score(
        &self,
        statistics: &Statistics,
        _configuration: &FactorSuite,
    ) -> Result<f64, ScoringError> {
        if statistics.is_empty() {
            return Err(ScoringError::Failed(
                "no measured samples to score".to_string(),
            ));
        }
        Ok(statistics.confidence_interval.lower)
    }

    fn name(&self) -> &str {
        "lower_bound"
    }
}

/// Adapts a closure into a [`Scorer`].
pub struct FnScorer<F> {
    name: String,
    f: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&Statistics, &FactorSuite) -> Result<f64, ScoringError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&Statistics, &FactorSuite) -> Result<f64, ScoringError> + Send + Sync,
{
    fn score(
        &self,
        statistics: &Statistics,
        configuration: &FactorSuite,
    ) -> Result<f64, ScoringError> {
        (self.f)(statistics, configuration)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Weighted blend
// ---------------------------------------------------------------------------

/// How a component score is mapped onto `[0, 1]` before blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// Already a rate; clamp into `[0, 1]`.
    Clamp,
    /// Linear map of `[min, max]` onto `[0, 1]`, clamped.
    Range { min: f64, max: f64 },
    /// Like `Range`, but smaller raw values are better (e.g. cost).
    InvertedRange { min: f64, max: f64 },
}

impl Normalization {
    fn apply(self, raw: f64) -> Result<f64, ScoringError> {
        let normalized = match self {
            Self::Clamp => raw,
            Self::Range { min, max } => linear(raw, min, max)?,
            Self::InvertedRange { min, max } => 1.0 - linear(raw, min, max)?,
        };
        Ok(normalized.clamp(0.0, 1.0))
    }
}

fn linear(raw: f64, min: f64, max: f64) -> Result<f64, ScoringError> {
    if !(min.is_finite() && max.is_finite()) || max <= min {
        return Err(ScoringError::InvalidWeights(format!(
            "normalization range [{min}, {max}] is empty"
        )));
    }
    Ok((raw - min) / (max - min))
}

struct Component {
    scorer: Arc<dyn Scorer>,
    weight: f64,
    normalization: Normalization,
}

/// Weighted average of component scores, each normalized to `[0, 1]`.
///
/// The result is always within `[0, 1]`. A failing component fails the
/// whole blend.
#[derive(Default)]
pub struct WeightedScorer {
    components: Vec<Component>,
}

impl WeightedScorer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(
        mut self,
        scorer: Arc<dyn Scorer>,
        weight: f64,
        normalization: Normalization,
    ) -> Self {
        self.components.push(Component {
            scorer,
            weight,
            normalization,
        });
        self
    }

    fn validate(&self) -> Result<f64, ScoringError> {
        if self.components.is_empty() {
            return Err(ScoringError::InvalidWeights("no components".to_string()));
        }
        if let Some(bad) = self
            .components
            .iter()
            .find(|c| !c.weight.is_finite() || c.weight < 0.0)
        {
            return Err(ScoringError::InvalidWeights(format!(
                "weight {} for '{}' must be finite and non-negative",
                bad.weight,
                bad.scorer.name()
            )));
        }
        let total: f64 = self.components.iter().map(|c| c.weight).sum();
        if total <= 0.0 {
            return Err(ScoringError::InvalidWeights(
                "weights sum to zero".to_string(),
            ));
        }
        Ok(total)
    }
}

impl Scorer for WeightedScorer {
    fn score(
        &self,
        statistics: &Statistics,
        configuration: &FactorSuite,
    ) -> Result<f64, ScoringError> {
        let total = self.validate()?;
        let mut blended = 0.0;
        for component in &self.components {
            let raw = component.scorer.score(statistics, configuration)?;
            if !raw.is_finite() {
                return Err(ScoringError::NonFinite(raw));
            }
            blended += component.weight * component.normalization.apply(raw)?;
        }
        Ok((blended / total).clamp(0.0, 1.0))
    }

    fn name(&self) -> &str {
        "weighted"
    }
}
