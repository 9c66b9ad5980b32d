//! The reported artifact of a single experiment run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SinkResult;

/// Which operation was executed first in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOrder {
    ControlFirst,
    CandidateFirst,
}

impl ExecutionOrder {
    /// Short label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOrder::ControlFirst => "control_first",
            ExecutionOrder::CandidateFirst => "candidate_first",
        }
    }
}

impl std::fmt::Display for ExecutionOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record of one experiment run.
///
/// Fields are private so an observation cannot be altered after the runner
/// builds it; ownership passes to the sink on publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    id: Uuid,
    name: String,
    matched: bool,
    control_duration: Duration,
    candidate_duration: Duration,
    order: ExecutionOrder,
    control_failed: bool,
    candidate_failed: bool,
    recorded_at: DateTime<Utc>,
}

impl Observation {
    /// Create an observation stamped with a fresh id and the current time.
    pub fn new(
        name: impl Into<String>,
        matched: bool,
        control_duration: Duration,
        candidate_duration: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            matched,
            control_duration,
            candidate_duration,
            order: ExecutionOrder::ControlFirst,
            control_failed: false,
            candidate_failed: false,
            recorded_at: Utc::now(),
        }
    }

    /// Set the execution order the run used.
    pub fn with_order(mut self, order: ExecutionOrder) -> Self {
        self.order = order;
        self
    }

    /// Set which sides of the run failed.
    pub fn with_failures(mut self, control_failed: bool, candidate_failed: bool) -> Self {
        self.control_failed = control_failed;
        self.candidate_failed = candidate_failed;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Experiment identifier supplied by the caller.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Verdict of equivalence resolution.
    pub fn matched(&self) -> bool {
        self.matched
    }

    pub fn control_duration(&self) -> Duration {
        self.control_duration
    }

    pub fn candidate_duration(&self) -> Duration {
        self.candidate_duration
    }

    pub fn order(&self) -> ExecutionOrder {
        self.order
    }

    pub fn control_failed(&self) -> bool {
        self.control_failed
    }

    pub fn candidate_failed(&self) -> bool {
        self.candidate_failed
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Serialize as a single JSON line.
    pub fn to_json(&self) -> SinkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_defaults() {
        let obs = Observation::new(
            "greet",
            true,
            Duration::from_millis(3),
            Duration::from_millis(4),
        );
        assert_eq!(obs.name(), "greet");
        assert!(obs.matched());
        assert_eq!(obs.order(), ExecutionOrder::ControlFirst);
        assert!(!obs.control_failed());
        assert!(!obs.candidate_failed());
    }

    #[test]
    fn test_builders_set_order_and_failures() {
        let obs = Observation::new("x", false, Duration::ZERO, Duration::ZERO)
            .with_order(ExecutionOrder::CandidateFirst)
            .with_failures(false, true);
        assert_eq!(obs.order(), ExecutionOrder::CandidateFirst);
        assert!(obs.candidate_failed());
        assert!(!obs.control_failed());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Observation::new("x", true, Duration::ZERO, Duration::ZERO);
        let b = Observation::new("x", true, Duration::ZERO, Duration::ZERO);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_json_uses_snake_case_order() {
        let obs = Observation::new("x", true, Duration::ZERO, Duration::ZERO)
            .with_order(ExecutionOrder::CandidateFirst);
        let json = obs.to_json().unwrap();
        assert!(json.contains("\"candidate_first\""));
        assert!(json.contains("\"name\":\"x\""));

        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, obs);
    }
}
