//! The result of one probe invocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A failure captured from a probe, either because the probe returned an
/// error, panicked, or produced a value the success criterion rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFailure {
    /// Category used for the failure breakdown in statistics.
    pub category: String,
    /// Human-readable description.
    pub message: String,
}

impl CapturedFailure {
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            message: message.into(),
        }
    }
}

/// Immutable outcome of a single sample.
///
/// Created by the sample executor and consumed once by the aggregator. Only
/// aggregates outlive a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Dispatch index within the run. Warmup samples are numbered separately.
    pub index: usize,
    /// Whether the sample counts as a success.
    pub success: bool,
    /// Structured value returned by the probe, when it was a JSON object.
    pub value: Option<Map<String, Value>>,
    /// Failure detail; always present when `success` is false.
    pub failure: Option<CapturedFailure>,
    /// Wall-clock duration of the probe invocation.
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    /// Cost units reported by the probe (e.g. tokens consumed).
    pub cost_units: Option<u64>,
    /// Warmup outcomes are never aggregated.
    pub warmup: bool,
}

impl Outcome {
    /// A successful outcome.
    pub fn succeeded(index: usize, duration: Duration) -> Self {
        Self {
            index,
            success: true,
            value: None,
            failure: None,
            duration,
            cost_units: None,
            warmup: false,
        }
    }

    /// A failed outcome carrying its captured failure.
    pub fn failed(index: usize, duration: Duration, failure: CapturedFailure) -> Self {
        Self {
            index,
            success: false,
            value: None,
            failure: Some(failure),
            duration,
            cost_units: None,
            warmup: false,
        }
    }

    pub fn with_value(mut self, value: Map<String, Value>) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_cost(mut self, cost_units: u64) -> Self {
        self.cost_units = Some(cost_units);
        self
    }

    pub fn as_warmup(mut self) -> Self {
        self.warmup = true;
        self
    }

    /// Failure category, if this outcome failed.
    pub fn failure_category(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.category.as_str())
    }
}

pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

pub(crate) mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_exposes_category() {
        let outcome = Outcome::failed(
            3,
            Duration::from_millis(12),
            CapturedFailure::new("timeout", "no reply"),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.failure_category(), Some("timeout"));
        assert!(!outcome.warmup);
    }

    #[test]
    fn test_outcome_serializes_duration_as_millis() {
        let outcome = Outcome::succeeded(0, Duration::from_millis(250)).with_cost(40);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["duration"], 250);
        assert_eq!(json["cost_units"], 40);
    }
}
