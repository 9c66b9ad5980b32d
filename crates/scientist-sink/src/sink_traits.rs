//! Sink trait definition
//!
//! `ObservationSink` is the only collaborator the experiment runner talks to
//! after a run. It is async and backend-agnostic; in-memory fakes live in the
//! `fakes` module.

use async_trait::async_trait;

use crate::error::SinkResult;
use crate::observation::Observation;

/// Consumer of finished observations.
///
/// Guarantees expected by the runner:
/// - `publish` takes ownership; the runner keeps no reference afterwards.
/// - A returned error is reported but never reaches the experiment's caller.
#[async_trait]
pub trait ObservationSink: Send + Sync {
    /// Hand one observation to the sink.
    async fn publish(&self, observation: Observation) -> SinkResult<()>;
}
