//! Equivalence resolution between a control and a candidate outcome.
//!
//! Policies are tried in a fixed order and the first applicable one decides:
//!
//! 1. comparison function, `Fn(&T, &T) -> bool`
//! 2. equality comparer, an [`EqualityComparer`] implementation
//! 3. natural equality, `T: PartialEq`, installed by `ExperimentBuilder::build`
//! 4. failure fallback
//!
//! Policies 1-3 only look at values. When either side failed they are
//! skipped and the failure fallback decides: two errors match when they are
//! the same variant with the same message; a lone failure or any panic never
//! matches. A policy that panics is reported as a non-match.

use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;

use crate::outcome::{Failure, Outcome};

/// Custom structural equality over result values.
pub trait EqualityComparer<T>: Send + Sync {
    fn equals(&self, control: &T, candidate: &T) -> bool;
}

/// Deep equality through `serde_json::Value`.
///
/// Useful for result types that are serializable but do not implement
/// `PartialEq`. A value that fails to serialize never matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEqualityComparer;

impl<T: Serialize> EqualityComparer<T> for JsonEqualityComparer {
    fn equals(&self, control: &T, candidate: &T) -> bool {
        match (serde_json::to_value(control), serde_json::to_value(candidate)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Which policy produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    ComparisonFunction,
    EqualityComparer,
    NaturalEquality,
    FailureFallback,
    /// Both sides produced values but no value policy was configured.
    Unconfigured,
    /// The deciding policy panicked.
    Panicked,
}

impl Policy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::ComparisonFunction => "comparison_function",
            Policy::EqualityComparer => "equality_comparer",
            Policy::NaturalEquality => "natural_equality",
            Policy::FailureFallback => "failure_fallback",
            Policy::Unconfigured => "unconfigured",
            Policy::Panicked => "panicked",
        }
    }
}

/// Outcome of equivalence resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub matched: bool,
    pub policy: Policy,
}

impl Verdict {
    fn new(matched: bool, policy: Policy) -> Self {
        Self { matched, policy }
    }
}

pub(crate) type CompareFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// The configured policy stack for one experiment.
pub struct Equivalence<T> {
    compare: Option<CompareFn<T>>,
    comparer: Option<Arc<dyn EqualityComparer<T>>>,
    natural: Option<fn(&T, &T) -> bool>,
}

impl<T> Default for Equivalence<T> {
    fn default() -> Self {
        Self {
            compare: None,
            comparer: None,
            natural: None,
        }
    }
}

impl<T> Clone for Equivalence<T> {
    fn clone(&self) -> Self {
        Self {
            compare: self.compare.clone(),
            comparer: self.comparer.clone(),
            natural: self.natural,
        }
    }
}

impl<T> fmt::Debug for Equivalence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equivalence")
            .field("compare", &self.compare.is_some())
            .field("comparer", &self.comparer.is_some())
            .field("natural", &self.natural.is_some())
            .finish()
    }
}

impl<T> Equivalence<T> {
    pub(crate) fn set_compare(&mut self, compare: CompareFn<T>) {
        self.compare = Some(compare);
    }

    pub(crate) fn set_comparer(&mut self, comparer: Arc<dyn EqualityComparer<T>>) {
        self.comparer = Some(comparer);
    }

    /// True when at least one value policy is configured.
    pub fn has_value_policy(&self) -> bool {
        self.compare.is_some() || self.comparer.is_some() || self.natural.is_some()
    }

    /// Decide whether two outcomes match.
    pub fn resolve<E: fmt::Display>(
        &self,
        control: &Outcome<T, E>,
        candidate: &Outcome<T, E>,
    ) -> Verdict {
        match (control.value(), candidate.value()) {
            (Some(a), Some(b)) => self.resolve_values(a, b),
            _ => Verdict::new(
                failures_match(control.failure(), candidate.failure()),
                Policy::FailureFallback,
            ),
        }
    }

    fn resolve_values(&self, control: &T, candidate: &T) -> Verdict {
        let (policy, verdict) = if let Some(compare) = &self.compare {
            (
                Policy::ComparisonFunction,
                guarded(|| compare(control, candidate)),
            )
        } else if let Some(comparer) = &self.comparer {
            (
                Policy::EqualityComparer,
                guarded(|| comparer.equals(control, candidate)),
            )
        } else if let Some(natural) = self.natural {
            // Candidate is checked against the control's value.
            (Policy::NaturalEquality, guarded(|| natural(candidate, control)))
        } else {
            (Policy::Unconfigured, Some(false))
        };

        match verdict {
            Some(matched) => Verdict::new(matched, policy),
            None => Verdict::new(false, Policy::Panicked),
        }
    }
}

impl<T: PartialEq> Equivalence<T> {
    pub(crate) fn set_natural(&mut self) {
        self.natural = Some(<T as PartialEq>::eq);
    }
}

/// Run a policy, turning a panic into `None`.
fn guarded<F: FnOnce() -> bool>(policy: F) -> Option<bool> {
    panic::catch_unwind(AssertUnwindSafe(policy)).ok()
}

fn failures_match<E: fmt::Display>(
    control: Option<&Failure<E>>,
    candidate: Option<&Failure<E>>,
) -> bool {
    match (control, candidate) {
        (Some(Failure::Error(a)), Some(Failure::Error(b))) => same_error(a, b),
        _ => false,
    }
}

/// Loose error identity: same enum variant and same message.
///
/// Both errors share the type `E`, so the variant stands in for the error's
/// type. Opaque error types (`anyhow::Error`, boxed trait objects) compare by
/// message alone.
pub fn same_error<E: fmt::Display>(a: &E, b: &E) -> bool {
    mem::discriminant(a) == mem::discriminant(b) && a.to_string() == b.to_string()
}
