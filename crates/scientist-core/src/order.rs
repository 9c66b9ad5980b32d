//! Execution order selection.
//!
//! A run flips a coin to decide whether the control or the candidate goes
//! first, so warm-up effects do not always favour the same side. The coin is
//! injected through [`OrderSelector`]; [`RandomOrder`] draws from the
//! thread-local generator and is safe to share across tasks.

use scientist_sink::ExecutionOrder;

/// Source of one unbiased binary choice per run.
pub trait OrderSelector: Send + Sync {
    fn select(&self) -> ExecutionOrder;
}

/// Fair coin backed by `rand`'s thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomOrder;

impl OrderSelector for RandomOrder {
    fn select(&self) -> ExecutionOrder {
        if rand::random::<bool>() {
            ExecutionOrder::ControlFirst
        } else {
            ExecutionOrder::CandidateFirst
        }
    }
}

/// Always picks the same order.
#[derive(Debug, Clone, Copy)]
pub struct FixedOrder(pub ExecutionOrder);

impl OrderSelector for FixedOrder {
    fn select(&self) -> ExecutionOrder {
        self.0
    }
}
