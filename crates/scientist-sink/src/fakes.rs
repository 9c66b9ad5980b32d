//! In-memory fakes for the sink trait (testing only)
//!
//! Provides `MemorySink`, `FailingSink`, and `StalledSink` that satisfy the
//! `ObservationSink` contract without any external dependencies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{SinkError, SinkResult};
use crate::observation::Observation;
use crate::sink_traits::ObservationSink;

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Sink that keeps every published observation in publish order.
#[derive(Debug, Default)]
pub struct MemorySink {
    observations: Mutex<Vec<Observation>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Observation>> {
        self.observations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of everything published so far.
    pub fn observations(&self) -> Vec<Observation> {
        self.guard().clone()
    }

    /// Most recently published observation.
    pub fn last(&self) -> Option<Observation> {
        self.guard().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }
}

#[async_trait]
impl ObservationSink for MemorySink {
    async fn publish(&self, observation: Observation) -> SinkResult<()> {
        self.guard().push(observation);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingSink
// ---------------------------------------------------------------------------

/// Sink whose every publish fails with `SinkError::Unavailable`.
#[derive(Debug)]
pub struct FailingSink {
    message: String,
    attempts: AtomicU64,
}

impl FailingSink {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            attempts: AtomicU64::new(0),
        }
    }

    /// Number of publish calls received.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSink for FailingSink {
    async fn publish(&self, _observation: Observation) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(SinkError::Unavailable(self.message.clone()))
    }
}

// ---------------------------------------------------------------------------
// StalledSink
// ---------------------------------------------------------------------------

/// Sink whose publish never completes.
#[derive(Debug, Default)]
pub struct StalledSink {
    attempts: AtomicU64,
}

impl StalledSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationSink for StalledSink {
    async fn publish(&self, _observation: Observation) -> SinkResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}
