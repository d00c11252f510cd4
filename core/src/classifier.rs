//! Failure classification
//!
//! A classifier decides whether a failed call is attributable to the guarded
//! service's health (a qualifying failure, counted toward tripping) or not,
//! e.g. a cancellation initiated by the caller. Either way the error still
//! reaches the caller.

use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Context provided to failure classifiers and `on_open` observers
pub struct FailureContext<'a> {
    /// Circuit name
    pub circuit_name: &'a str,
    /// The error that occurred (can be downcast to specific types)
    pub error: &'a dyn Any,
    /// The same error, for logging
    pub reason: &'a dyn fmt::Display,
    /// How long the failed call ran
    pub elapsed: Duration,
}

impl<'a> FailureContext<'a> {
    /// Downcast the error to a concrete type
    pub fn downcast_ref<E: Any>(&self) -> Option<&'a E> {
        self.error.downcast_ref::<E>()
    }
}

impl fmt::Debug for FailureContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureContext")
            .field("circuit_name", &self.circuit_name)
            .field("reason", &format_args!("{}", self.reason))
            .field("elapsed", &self.elapsed)
            .finish()
    }
}

/// Trait for classifying failures - determines if an error should trip the circuit
///
/// # Examples
///
/// ```rust
/// use tripwire::{FailureClassifier, FailureContext};
///
/// #[derive(Debug)]
/// struct IgnoreCancellation;
///
/// impl FailureClassifier for IgnoreCancellation {
///     fn should_trip(&self, ctx: &FailureContext<'_>) -> bool {
///         ctx.downcast_ref::<std::io::Error>()
///             .map(|e| e.kind() != std::io::ErrorKind::Interrupted)
///             .unwrap_or(true)
///     }
/// }
/// ```
pub trait FailureClassifier: Send + Sync + fmt::Debug {
    /// Returns `true` if the error should count toward opening the circuit
    fn should_trip(&self, ctx: &FailureContext<'_>) -> bool;
}

/// Default classifier that trips on all errors
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl FailureClassifier for DefaultClassifier {
    fn should_trip(&self, _ctx: &FailureContext<'_>) -> bool {
        true
    }
}

/// Predicate-based classifier using a closure
pub struct PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> FailureClassifier for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn should_trip(&self, ctx: &FailureContext<'_>) -> bool {
        (self.predicate)(ctx)
    }
}

impl<F> fmt::Debug for PredicateClassifier<F>
where
    F: Fn(&FailureContext<'_>) -> bool + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateClassifier")
            .field("predicate", &"<closure>")
            .finish()
    }
}
