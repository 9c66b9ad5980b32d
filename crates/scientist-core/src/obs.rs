//! Structured observability hooks for experiment runs.
//!
//! This module provides:
//! - An experiment-scoped span via [`experiment_span`]
//! - Emission functions for run lifecycle events: start, finish, mismatch,
//!   comparison panic, publish failure, dropped observation
//!
//! Mismatches are reported at `info!`, failures of the experiment machinery
//! at `warn!`, and per-run lifecycle noise at `debug!`.

use std::time::Duration;

use scientist_sink::ExecutionOrder;
use tracing::{debug, info, warn};

use crate::equivalence::Verdict;

/// Span tagged with the experiment name. Attach with
/// `tracing::Instrument::instrument` so it survives across awaits.
pub fn experiment_span(name: &str) -> tracing::Span {
    tracing::info_span!("scientist.experiment", experiment = %name)
}

/// Emit event: run started with the selected order.
pub fn emit_run_started(name: &str, order: ExecutionOrder) {
    debug!(event = "run.started", experiment = %name, order = %order);
}

/// Emit event: run finished with order, verdict and both durations.
pub fn emit_run_finished(
    name: &str,
    order: ExecutionOrder,
    verdict: Verdict,
    control_duration: Duration,
    candidate_duration: Duration,
) {
    debug!(
        event = "run.finished",
        experiment = %name,
        order = %order,
        matched = verdict.matched,
        policy = verdict.policy.as_str(),
        control_us = control_duration.as_micros() as u64,
        candidate_us = candidate_duration.as_micros() as u64,
    );
}

/// Emit event: candidate disagreed with control.
pub fn emit_mismatch(name: &str, control_failed: bool, candidate_failed: bool) {
    info!(
        event = "run.mismatch",
        experiment = %name,
        control_failed = control_failed,
        candidate_failed = candidate_failed,
    );
}

/// Emit event: an equivalence policy panicked (warning level).
pub fn emit_comparison_panicked(name: &str) {
    warn!(event = "run.comparison_panicked", experiment = %name);
}

/// Emit event: inline publish failed (warning level).
pub fn emit_publish_failed(name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.publish_failed", experiment = %name, error = %error);
}

/// Emit event: observation could not be queued (warning level).
pub fn emit_observation_dropped(name: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.observation_dropped", experiment = %name, error = %error);
}
