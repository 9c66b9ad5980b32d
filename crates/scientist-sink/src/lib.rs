//! Scientist-Sink: Reporting Boundary for Experiments
//!
//! This crate owns everything an experiment hands to the outside world once a
//! run has finished. The core runner builds an [`Observation`] and gives it
//! away; what happens after that is the sink's business.
//!
//! ## Key Components
//!
//! - `Observation`: immutable record of one run (name, verdict, durations)
//! - `ObservationSink`: async publish interface implemented by consumers
//! - `ObservationPublisher`: bounded background queue in front of a sink
//! - `fakes`: in-memory sinks for tests

mod error;
pub mod fakes;
mod observation;
pub mod publisher;
pub mod sink_traits;

pub use error::{SinkError, SinkResult};
pub use observation::{ExecutionOrder, Observation};
pub use publisher::{ObservationPublisher, PublisherStats};
pub use sink_traits::ObservationSink;
