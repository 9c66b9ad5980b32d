//! Construction and configuration errors for experiments.
//!
//! Failures of the control or candidate never show up here: the control's
//! own error is handed back to the caller untouched, and everything else is
//! absorbed into the observation.

/// Errors produced while building an experiment or loading its config.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("experiment name must not be empty")]
    InvalidName,

    #[error("missing {0} operation")]
    MissingOperation(&'static str),

    #[error("no equivalence policy: supply a comparison function or an equality comparer")]
    MissingEquivalence,

    #[error("no observation sink or publisher configured")]
    MissingSink,

    #[error("background publishing requires a running tokio runtime")]
    NoRuntime,

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type for experiment construction.
pub type Result<T> = std::result::Result<T, ExperimentError>;
