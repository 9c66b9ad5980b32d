//! Experiment configuration.
//!
//! `ExperimentConfig` can be built in code, deserialized as part of an
//! application's own config file, or read from `SCIENTIST_*` environment
//! variables via [`ExperimentConfig::from_env`].

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExperimentError, Result};

pub const ENV_PUBLISH_MODE: &str = "SCIENTIST_PUBLISH_MODE";
pub const ENV_EXECUTION_MODE: &str = "SCIENTIST_EXECUTION_MODE";
pub const ENV_FAILURE_TIMING: &str = "SCIENTIST_FAILURE_TIMING";
pub const ENV_QUEUE_CAPACITY: &str = "SCIENTIST_QUEUE_CAPACITY";

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How a finished observation reaches the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// Queue to a background worker; the caller never waits on the sink.
    #[default]
    Background,
    /// Await `publish` before returning to the caller.
    Await,
}

/// Whether control and candidate run one after the other or together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    /// Both futures are polled together, started in the selected order.
    Concurrent,
}

/// Duration recorded for an operation that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTiming {
    /// Failed attempts report a zero duration.
    #[default]
    Zero,
    /// Failed attempts report the time until the failure surfaced.
    Elapsed,
}

impl FailureTiming {
    pub(crate) fn failure_duration(self, elapsed: Duration) -> Duration {
        match self {
            FailureTiming::Zero => Duration::ZERO,
            FailureTiming::Elapsed => elapsed,
        }
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> ExperimentError {
    ExperimentError::InvalidConfig(format!("{key}: unknown value '{value}' (expected {expected})"))
}

impl FromStr for PublishMode {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "background" => Ok(PublishMode::Background),
            "await" => Ok(PublishMode::Await),
            other => Err(invalid("publish_mode", other, "background|await")),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "concurrent" => Ok(ExecutionMode::Concurrent),
            other => Err(invalid("execution_mode", other, "sequential|concurrent")),
        }
    }
}

impl FromStr for FailureTiming {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(FailureTiming::Zero),
            "elapsed" => Ok(FailureTiming::Elapsed),
            other => Err(invalid("failure_timing", other, "zero|elapsed")),
        }
    }
}

/// Tunables shared by every run of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub publish_mode: PublishMode,
    pub execution_mode: ExecutionMode,
    pub failure_timing: FailureTiming,
    /// Slots in the background publish queue.
    pub queue_capacity: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            publish_mode: PublishMode::default(),
            execution_mode: ExecutionMode::default(),
            failure_timing: FailureTiming::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl ExperimentConfig {
    /// Load from `SCIENTIST_*` environment variables, defaulting unset keys.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(v) = lookup(ENV_PUBLISH_MODE) {
            config.publish_mode = v.parse()?;
        }
        if let Some(v) = lookup(ENV_EXECUTION_MODE) {
            config.execution_mode = v.parse()?;
        }
        if let Some(v) = lookup(ENV_FAILURE_TIMING) {
            config.failure_timing = v.parse()?;
        }
        if let Some(v) = lookup(ENV_QUEUE_CAPACITY) {
            config.queue_capacity = v.trim().parse().map_err(|_| {
                ExperimentError::InvalidConfig(format!("queue_capacity: not a number: '{v}'"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the runner cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(ExperimentError::InvalidConfig(
                "queue_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExperimentConfig::default();
        assert_eq!(config.publish_mode, PublishMode::Background);
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.failure_timing, FailureTiming::Zero);
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ExperimentConfig::from_lookup(lookup(&[
            (ENV_PUBLISH_MODE, "Await"),
            (ENV_EXECUTION_MODE, "concurrent"),
            (ENV_FAILURE_TIMING, " elapsed "),
            (ENV_QUEUE_CAPACITY, "16"),
        ]))
        .unwrap();
        assert_eq!(config.publish_mode, PublishMode::Await);
        assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.failure_timing, FailureTiming::Elapsed);
        assert_eq!(config.queue_capacity, 16);
    }

    #[test]
    fn test_lookup_empty_is_default() {
        let config = ExperimentConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, ExperimentConfig::default());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = ExperimentConfig::from_lookup(lookup(&[(ENV_PUBLISH_MODE, "later")]))
            .unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidConfig(ref m) if m.contains("later")));
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = ExperimentConfig::from_lookup(lookup(&[(ENV_QUEUE_CAPACITY, "0")])).unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidConfig(_)));
    }

    #[test]
    fn test_non_numeric_capacity_rejected() {
        let err = ExperimentConfig::from_lookup(lookup(&[(ENV_QUEUE_CAPACITY, "lots")])).unwrap_err();
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_deserialize_partial_json() {
        let config: ExperimentConfig =
            serde_json::from_str(r#"{"publish_mode":"await","failure_timing":"elapsed"}"#).unwrap();
        assert_eq!(config.publish_mode, PublishMode::Await);
        assert_eq!(config.failure_timing, FailureTiming::Elapsed);
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn test_failure_duration() {
        let elapsed = Duration::from_millis(7);
        assert_eq!(FailureTiming::Zero.failure_duration(elapsed), Duration::ZERO);
        assert_eq!(FailureTiming::Elapsed.failure_duration(elapsed), elapsed);
    }
}
