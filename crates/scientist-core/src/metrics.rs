//! Global atomic counters for experiment runs.
//!
//! Counters are incremented silently by the runner. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. on a timer or at shutdown).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    runs: AtomicU64,
    mismatches: AtomicU64,
    control_failures: AtomicU64,
    candidate_failures: AtomicU64,
    comparison_panics: AtomicU64,
    publish_failures: AtomicU64,
    observations_dropped: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub runs: u64,
    pub mismatches: u64,
    pub control_failures: u64,
    pub candidate_failures: u64,
    pub comparison_panics: u64,
    pub publish_failures: u64,
    pub observations_dropped: u64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            mismatches: AtomicU64::new(0),
            control_failures: AtomicU64::new(0),
            candidate_failures: AtomicU64::new(0),
            comparison_panics: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            observations_dropped: AtomicU64::new(0),
        }
    }

    pub fn inc_runs(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mismatches(&self) {
        self.mismatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_control_failures(&self) {
        self.control_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_candidate_failures(&self) {
        self.candidate_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_comparison_panics(&self) {
        self.comparison_panics.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "comparison_panics", "counter incremented");
    }

    pub fn inc_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "publish_failures", "counter incremented");
    }

    pub fn inc_observations_dropped(&self) {
        self.observations_dropped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "observations_dropped", "counter incremented");
    }

    /// Read every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            mismatches: self.mismatches.load(Ordering::Relaxed),
            control_failures: self.control_failures.load(Ordering::Relaxed),
            candidate_failures: self.candidate_failures.load(Ordering::Relaxed),
            comparison_panics: self.comparison_panics.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            observations_dropped: self.observations_dropped.load(Ordering::Relaxed),
        }
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        let s = self.snapshot();
        tracing::info!(
            metric = "flush",
            runs = s.runs,
            mismatches = s.mismatches,
            control_failures = s.control_failures,
            candidate_failures = s.candidate_failures,
            comparison_panics = s.comparison_panics,
            publish_failures = s.publish_failures,
            observations_dropped = s.observations_dropped,
        );
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.runs,
            &self.mismatches,
            &self.control_failures,
            &self.candidate_failures,
            &self.comparison_panics,
            &self.publish_failures,
            &self.observations_dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_runs();
        m.inc_runs();
        m.inc_mismatches();
        m.inc_candidate_failures();
        m.inc_publish_failures();

        let s = m.snapshot();
        assert_eq!(s.runs, 2);
        assert_eq!(s.mismatches, 1);
        assert_eq!(s.candidate_failures, 1);
        assert_eq!(s.publish_failures, 1);
        assert_eq!(s.control_failures, 0);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_runs();
        m.inc_control_failures();
        m.inc_comparison_panics();
        m.inc_observations_dropped();
        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
