//! Scientist Core
//!
//! Runs a candidate implementation next to the trusted control in a live
//! call path. The caller always gets the control's result; the candidate is
//! only compared, and an [`Observation`] describing agreement and timing is
//! handed to an [`ObservationSink`].
//!
//! ## Key Components
//!
//! - `Experiment` / `ExperimentBuilder`: construction and the `run` entry point
//! - `capture` / `Outcome`: timed, panic-safe execution of one operation
//! - `Equivalence`: ordered comparison policies with a failure fallback
//! - `OrderSelector`: per-run coin flip for execution order
//! - `ExperimentConfig`: publish, execution and timing modes

pub mod config;
pub mod equivalence;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod obs;
pub mod order;
pub mod outcome;
pub mod telemetry;

pub use config::{ExecutionMode, ExperimentConfig, FailureTiming, PublishMode};
pub use equivalence::{
    same_error, EqualityComparer, Equivalence, JsonEqualityComparer, Policy, Verdict,
};
pub use error::{ExperimentError, Result};
pub use experiment::{Experiment, ExperimentBuilder, Operation};
pub use metrics::{MetricsSnapshot, METRICS};
pub use obs::{
    emit_comparison_panicked, emit_mismatch, emit_observation_dropped, emit_publish_failed,
    emit_run_finished, emit_run_started, experiment_span,
};
pub use order::{FixedOrder, OrderSelector, RandomOrder};
pub use outcome::{capture, panic_message, Failure, Outcome};
pub use telemetry::init_tracing;

pub use scientist_sink::{
    fakes, ExecutionOrder, Observation, ObservationPublisher, ObservationSink, PublisherStats,
    SinkError, SinkResult,
};

/// Scientist version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
