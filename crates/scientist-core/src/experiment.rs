//! Run orchestration.
//!
//! An [`Experiment`] owns a control and a candidate operation and exposes a
//! single entry point, [`Experiment::run`], which behaves exactly like the
//! control would have on its own: same value, same error. Along the way it
//! executes the candidate, compares the two outcomes and reports an
//! [`Observation`].
//!
//! # Example
//!
//! ```ignore
//! let experiment = Experiment::builder("greet")
//!     .control(|| async { Ok::<_, MyError>("hello".to_string()) })
//!     .candidate(|| async { Ok("hello".to_string()) })
//!     .sink(sink)
//!     .build()?;
//!
//! let greeting = experiment.run().await?;
//! ```

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use scientist_sink::{
    ExecutionOrder, Observation, ObservationPublisher, ObservationSink, PublisherStats,
};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ExecutionMode, ExperimentConfig, PublishMode};
use crate::equivalence::{EqualityComparer, Equivalence, Policy};
use crate::error::{ExperimentError, Result};
use crate::metrics::METRICS;
use crate::obs;
use crate::order::{OrderSelector, RandomOrder};
use crate::outcome::{capture, Failure, Outcome};

/// Type-erased zero-argument async operation.
pub type Operation<T, E> =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<T, E>> + Send + Sync>;

fn erase<T, E, F, Fut>(operation: F) -> Operation<T, E>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    Arc::new(move || operation().boxed())
}

/// Where observations go once a run is done.
enum Reporter {
    Inline(Arc<dyn ObservationSink>),
    /// The worker handle is kept only when the experiment spawned the
    /// worker itself.
    Queued(ObservationPublisher, Option<JoinHandle<PublisherStats>>),
}

/// A control/candidate pair with its comparison and reporting setup.
///
/// Immutable after construction; `run` may be called repeatedly and from
/// many tasks at once.
pub struct Experiment<T, E> {
    name: String,
    control: Operation<T, E>,
    candidate: Operation<T, E>,
    equivalence: Equivalence<T>,
    order: Arc<dyn OrderSelector>,
    config: ExperimentConfig,
    reporter: Reporter,
}

impl<T, E> fmt::Debug for Experiment<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("equivalence", &self.equivalence)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, E> Experiment<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Start building an experiment called `name`.
    pub fn builder(name: impl Into<String>) -> ExperimentBuilder<T, E> {
        ExperimentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Close the experiment and wait for its own background worker to
    /// publish everything already queued.
    ///
    /// Returns the worker's counts when this experiment spawned the worker
    /// (a `sink` in [`PublishMode::Background`]). A publisher passed through
    /// `ExperimentBuilder::publisher` is flushed by awaiting the handle
    /// returned from [`ObservationPublisher::spawn`] instead, so `None` is
    /// returned for it, as it is for inline publishing.
    pub async fn shutdown(self) -> Option<PublisherStats> {
        match self.reporter {
            Reporter::Queued(publisher, Some(worker)) => {
                drop(publisher);
                worker.await.ok()
            }
            _ => None,
        }
    }

    /// Run both operations and return what the control returned.
    ///
    /// The control's error is returned as-is and a control panic is resumed
    /// on the caller. Candidate failures, comparison panics and sink failures
    /// never reach the caller.
    pub async fn run(&self) -> std::result::Result<T, E> {
        self.run_observed()
            .instrument(obs::experiment_span(&self.name))
            .await
    }

    async fn run_observed(&self) -> std::result::Result<T, E> {
        let order = self.order.select();
        obs::emit_run_started(&self.name, order);

        let (control, candidate) = self.execute(order).await;
        let verdict = self.equivalence.resolve(&control, &candidate);

        METRICS.inc_runs();
        if control.is_failure() {
            METRICS.inc_control_failures();
        }
        if candidate.is_failure() {
            METRICS.inc_candidate_failures();
        }
        if verdict.policy == Policy::Panicked {
            METRICS.inc_comparison_panics();
            obs::emit_comparison_panicked(&self.name);
        }
        if !verdict.matched {
            METRICS.inc_mismatches();
            obs::emit_mismatch(&self.name, control.is_failure(), candidate.is_failure());
        }
        obs::emit_run_finished(
            &self.name,
            order,
            verdict,
            control.duration(),
            candidate.duration(),
        );

        let observation = Observation::new(
            self.name.clone(),
            verdict.matched,
            control.duration(),
            candidate.duration(),
        )
        .with_order(order)
        .with_failures(control.is_failure(), candidate.is_failure());
        self.report(observation).await;

        match control.into_result() {
            Ok(value) => Ok(value),
            Err(Failure::Error(err)) => Err(err),
            Err(Failure::Panic(payload)) => panic::resume_unwind(payload),
        }
    }

    /// Execute control and candidate once each, in the selected order.
    async fn execute(&self, order: ExecutionOrder) -> (Outcome<T, E>, Outcome<T, E>) {
        let timing = self.config.failure_timing;
        let control = capture(|| (self.control)(), timing);
        let candidate = capture(|| (self.candidate)(), timing);

        match (self.config.execution_mode, order) {
            (ExecutionMode::Sequential, ExecutionOrder::ControlFirst) => {
                let control = control.await;
                let candidate = candidate.await;
                (control, candidate)
            }
            (ExecutionMode::Sequential, ExecutionOrder::CandidateFirst) => {
                let candidate = candidate.await;
                let control = control.await;
                (control, candidate)
            }
            (ExecutionMode::Concurrent, ExecutionOrder::ControlFirst) => {
                futures::join!(control, candidate)
            }
            (ExecutionMode::Concurrent, ExecutionOrder::CandidateFirst) => {
                let (candidate, control) = futures::join!(candidate, control);
                (control, candidate)
            }
        }
    }

    async fn report(&self, observation: Observation) {
        match &self.reporter {
            Reporter::Inline(sink) => {
                let published = AssertUnwindSafe(sink.publish(observation))
                    .catch_unwind()
                    .await;
                match published {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        METRICS.inc_publish_failures();
                        obs::emit_publish_failed(&self.name, &err);
                    }
                    Err(_) => {
                        METRICS.inc_publish_failures();
                        obs::emit_publish_failed(&self.name, &"sink panicked");
                    }
                }
            }
            Reporter::Queued(publisher, _) => {
                if let Err(err) = publisher.submit(observation) {
                    METRICS.inc_observations_dropped();
                    obs::emit_observation_dropped(&self.name, &err);
                }
            }
        }
    }
}

/// Builder for [`Experiment`].
///
/// Control, candidate and a sink (or publisher) are required. Result types
/// implementing `PartialEq` use [`build`](Self::build), which installs
/// natural equality below any custom policy; other result types use
/// [`build_custom`](Self::build_custom) and must supply a comparison function
/// or an equality comparer.
pub struct ExperimentBuilder<T, E> {
    name: String,
    control: Option<Operation<T, E>>,
    candidate: Option<Operation<T, E>>,
    equivalence: Equivalence<T>,
    order: Arc<dyn OrderSelector>,
    config: ExperimentConfig,
    sink: Option<Arc<dyn ObservationSink>>,
    publisher: Option<ObservationPublisher>,
}

impl<T, E> ExperimentBuilder<T, E>
where
    T: Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control: None,
            candidate: None,
            equivalence: Equivalence::default(),
            order: Arc::new(RandomOrder),
            config: ExperimentConfig::default(),
            sink: None,
            publisher: None,
        }
    }

    /// The trusted implementation whose result is always returned.
    pub fn control<F, Fut>(mut self, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        self.control = Some(erase(operation));
        self
    }

    /// The implementation under evaluation.
    pub fn candidate<F, Fut>(mut self, operation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        self.candidate = Some(erase(operation));
        self
    }

    /// Comparison function; takes precedence over every other policy.
    pub fn compare_with<F>(mut self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.equivalence.set_compare(Arc::new(compare));
        self
    }

    /// Equality comparer; used when no comparison function is set.
    pub fn equality_comparer<C>(mut self, comparer: C) -> Self
    where
        C: EqualityComparer<T> + 'static,
    {
        self.equivalence.set_comparer(Arc::new(comparer));
        self
    }

    pub fn order_selector<S>(mut self, selector: S) -> Self
    where
        S: OrderSelector + 'static,
    {
        self.order = Arc::new(selector);
        self
    }

    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Sink to publish to; wrapped according to `config.publish_mode`.
    ///
    /// In background mode the experiment owns the worker; call
    /// [`Experiment::shutdown`] to flush it before the runtime stops.
    pub fn sink(mut self, sink: Arc<dyn ObservationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Existing background publisher; takes precedence over `sink`.
    pub fn publisher(mut self, publisher: ObservationPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Build for result types without `PartialEq`.
    pub fn build_custom(self) -> Result<Experiment<T, E>> {
        if !self.equivalence.has_value_policy() {
            return Err(ExperimentError::MissingEquivalence);
        }
        self.finish()
    }

    fn finish(self) -> Result<Experiment<T, E>> {
        if self.name.trim().is_empty() {
            return Err(ExperimentError::InvalidName);
        }
        self.config.validate()?;
        let control = self
            .control
            .ok_or(ExperimentError::MissingOperation("control"))?;
        let candidate = self
            .candidate
            .ok_or(ExperimentError::MissingOperation("candidate"))?;

        let reporter = match (self.publisher, self.sink) {
            (Some(publisher), _) => Reporter::Queued(publisher, None),
            (None, Some(sink)) => match self.config.publish_mode {
                PublishMode::Await => Reporter::Inline(sink),
                PublishMode::Background => {
                    if tokio::runtime::Handle::try_current().is_err() {
                        return Err(ExperimentError::NoRuntime);
                    }
                    // Worker exits once the experiment is dropped or shut down.
                    let (publisher, worker) =
                        ObservationPublisher::spawn(sink, self.config.queue_capacity);
                    Reporter::Queued(publisher, Some(worker))
                }
            },
            (None, None) => return Err(ExperimentError::MissingSink),
        };

        Ok(Experiment {
            name: self.name,
            control,
            candidate,
            equivalence: self.equivalence,
            order: self.order,
            config: self.config,
            reporter,
        })
    }
}

impl<T, E> ExperimentBuilder<T, E>
where
    T: PartialEq + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    /// Build with natural equality as the last value policy.
    pub fn build(mut self) -> Result<Experiment<T, E>> {
        self.equivalence.set_natural();
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::FixedOrder;
    use scientist_sink::fakes::MemorySink;

    fn builder() -> ExperimentBuilder<u32, String> {
        Experiment::builder("unit")
            .control(|| async { Ok(1) })
            .candidate(|| async { Ok(1) })
    }

    #[test]
    fn test_build_rejects_blank_name() {
        let err = Experiment::<u32, String>::builder("  ")
            .control(|| async { Ok(1) })
            .candidate(|| async { Ok(1) })
            .sink(Arc::new(MemorySink::new()))
            .config(ExperimentConfig {
                publish_mode: PublishMode::Await,
                ..Default::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName));
    }

    #[test]
    fn test_build_requires_both_operations() {
        let err = Experiment::<u32, String>::builder("x")
            .control(|| async { Ok(1) })
            .sink(Arc::new(MemorySink::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExperimentError::MissingOperation("candidate")));
    }

    #[test]
    fn test_build_requires_sink() {
        let err = builder().build().unwrap_err();
        assert!(matches!(err, ExperimentError::MissingSink));
    }

    #[test]
    fn test_background_without_runtime_fails() {
        let err = builder()
            .sink(Arc::new(MemorySink::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ExperimentError::NoRuntime));
    }

    #[test]
    fn test_build_custom_requires_policy() {
        struct Opaque;
        let err = Experiment::<Opaque, String>::builder("opaque")
            .control(|| async { Ok(Opaque) })
            .candidate(|| async { Ok(Opaque) })
            .sink(Arc::new(MemorySink::new()))
            .build_custom()
            .unwrap_err();
        assert!(matches!(err, ExperimentError::MissingEquivalence));
    }

    #[tokio::test]
    async fn test_sequential_order_is_respected() {
        let calls = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (c1, c2) = (calls.clone(), calls.clone());
        let sink = Arc::new(MemorySink::new());

        let experiment = Experiment::<u32, String>::builder("order")
            .control(move || {
                let calls = c1.clone();
                async move {
                    calls.lock().unwrap().push("control");
                    Ok(1)
                }
            })
            .candidate(move || {
                let calls = c2.clone();
                async move {
                    calls.lock().unwrap().push("candidate");
                    Ok(1)
                }
            })
            .order_selector(FixedOrder(ExecutionOrder::CandidateFirst))
            .config(ExperimentConfig {
                publish_mode: PublishMode::Await,
                ..Default::default()
            })
            .sink(sink.clone())
            .build()
            .unwrap();

        assert_eq!(experiment.run().await, Ok(1));
        assert_eq!(*calls.lock().unwrap(), vec!["candidate", "control"]);
        assert_eq!(
            sink.last().unwrap().order(),
            ExecutionOrder::CandidateFirst
        );
    }
}
