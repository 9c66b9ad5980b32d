//! Background publishing queue.
//!
//! The publisher decouples the caller of an experiment from the sink:
//! `submit` never waits, and a worker task drains the queue into the sink.
//! Dropping every publisher handle closes the queue; the worker finishes the
//! observations already queued and then exits, so awaiting its `JoinHandle`
//! acts as a flush.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{SinkError, SinkResult};
use crate::observation::Observation;
use crate::sink_traits::ObservationSink;

/// Counts reported by the worker when it shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherStats {
    pub published: u64,
    pub failed: u64,
}

/// Cloneable handle to a bounded observation queue.
#[derive(Debug, Clone)]
pub struct ObservationPublisher {
    tx: mpsc::Sender<Observation>,
    capacity: usize,
}

impl ObservationPublisher {
    /// Spawn the worker task on the current tokio runtime.
    ///
    /// A `capacity` of zero is raised to one.
    pub fn spawn(
        sink: Arc<dyn ObservationSink>,
        capacity: usize,
    ) -> (Self, JoinHandle<PublisherStats>) {
        let capacity = capacity.max(1);
        let (tx, mut rx) = mpsc::channel::<Observation>(capacity);

        let worker = tokio::spawn(async move {
            let mut stats = PublisherStats::default();
            while let Some(observation) = rx.recv().await {
                let name = observation.name().to_string();
                // A panicking sink must not take the worker down with it.
                let published = AssertUnwindSafe(sink.publish(observation))
                    .catch_unwind()
                    .await;
                match published {
                    Ok(Ok(())) => stats.published += 1,
                    Ok(Err(err)) => {
                        stats.failed += 1;
                        warn!(
                            event = "publisher.publish_failed",
                            experiment = %name,
                            error = %err,
                        );
                    }
                    Err(_) => {
                        stats.failed += 1;
                        warn!(
                            event = "publisher.publish_failed",
                            experiment = %name,
                            error = "sink panicked",
                        );
                    }
                }
            }
            debug!(
                published = stats.published,
                failed = stats.failed,
                "observation publisher drained"
            );
            stats
        });

        (Self { tx, capacity }, worker)
    }

    /// Queue an observation without waiting.
    pub fn submit(&self, observation: Observation) -> SinkResult<()> {
        self.tx.try_send(observation).map_err(|err| match err {
            TrySendError::Full(_) => SinkError::QueueFull {
                capacity: self.capacity,
            },
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FailingSink, MemorySink, StalledSink};
    use std::time::Duration;

    fn obs(name: &str) -> Observation {
        Observation::new(name, true, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_worker_drains_queue_on_drop() {
        let sink = Arc::new(MemorySink::new());
        let (publisher, worker) = ObservationPublisher::spawn(sink.clone(), 8);

        publisher.submit(obs("a")).unwrap();
        publisher.submit(obs("b")).unwrap();
        drop(publisher);

        let stats = worker.await.unwrap();
        assert_eq!(stats.published, 2);
        assert_eq!(stats.failed, 0);

        let names: Vec<String> = sink
            .observations()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let sink = Arc::new(FailingSink::new("collector down"));
        let (publisher, worker) = ObservationPublisher::spawn(sink.clone(), 4);

        publisher.submit(obs("a")).unwrap();
        drop(publisher);

        let stats = worker.await.unwrap();
        assert_eq!(stats.failed, 1);
        assert_eq!(sink.attempts(), 1);
    }

    #[tokio::test]
    async fn test_worker_survives_sink_panic() {
        struct PanicOnceSink {
            calls: std::sync::atomic::AtomicU64,
            inner: MemorySink,
        }

        #[async_trait::async_trait]
        impl ObservationSink for PanicOnceSink {
            async fn publish(&self, observation: Observation) -> SinkResult<()> {
                let n = self
                    .calls
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    panic!("sink bug");
                }
                self.inner.publish(observation).await
            }
        }

        let sink = Arc::new(PanicOnceSink {
            calls: Default::default(),
            inner: MemorySink::new(),
        });
        let (publisher, worker) = ObservationPublisher::spawn(sink.clone(), 8);

        for name in ["a", "b", "c"] {
            publisher.submit(obs(name)).unwrap();
        }
        drop(publisher);

        let stats = worker.await.unwrap();
        assert_eq!(stats, PublisherStats { published: 2, failed: 1 });
        assert_eq!(sink.inner.len(), 2);
    }

    #[tokio::test]
    async fn test_submit_reports_full_queue() {
        let sink = Arc::new(StalledSink::new());
        let (publisher, _worker) = ObservationPublisher::spawn(sink, 1);

        // The worker takes at most one observation off the queue and then
        // stalls inside the sink, so a handful of submits must overflow.
        let mut full = 0;
        for i in 0..4 {
            if let Err(SinkError::QueueFull { capacity }) = publisher.submit(obs(&i.to_string())) {
                assert_eq!(capacity, 1);
                full += 1;
            }
        }
        assert!(full >= 2);
    }

    #[tokio::test]
    async fn test_submit_after_worker_exit_is_closed() {
        let sink = Arc::new(MemorySink::new());
        let (publisher, worker) = ObservationPublisher::spawn(sink, 1);
        worker.abort();
        let _ = worker.await;

        let err = publisher.submit(obs("late")).unwrap_err();
        assert!(matches!(err, SinkError::Closed));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let (publisher, _worker) = ObservationPublisher::spawn(Arc::new(MemorySink::new()), 0);
        assert_eq!(publisher.capacity(), 1);
    }
}
