//! Builder API for ergonomic circuit breaker configuration

use crate::{
    MemoryStorage, StorageBackend,
    callbacks::Callbacks,
    circuit::{CircuitBreaker, CircuitContext, Config},
    classifier::{DefaultClassifier, FailureClassifier, FailureContext, PredicateClassifier},
    errors::ConfigError,
};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating circuit breakers with fluent API
pub struct CircuitBuilder {
    name: String,
    config: Config,
    storage: Option<Arc<dyn StorageBackend>>,
    failure_classifier: Option<Arc<dyn FailureClassifier>>,
    callbacks: Callbacks,
}

impl CircuitBuilder {
    /// Create a new builder for a circuit with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            storage: None,
            failure_classifier: None,
            callbacks: Callbacks::new(),
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the number of consecutive qualifying failures that opens the circuit
    pub fn failure_threshold(mut self, threshold: usize) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before a trial call
    pub fn break_duration(mut self, duration: Duration) -> Self {
        self.config.break_duration = duration;
        self
    }

    /// Set custom storage backend
    ///
    /// Share one backend between breakers to read their streaks from one
    /// place, or pass one built on a `ManualClock` to control time.
    pub fn storage(mut self, storage: Arc<dyn StorageBackend>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set a failure classifier to filter which errors should trip the circuit
    ///
    /// Without one, every failure counts.
    pub fn failure_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.failure_classifier = Some(classifier);
        self
    }

    /// Classify failures with a closure; return `false` for errors that should not count
    ///
    /// # Examples
    ///
    /// ```rust
    /// use tripwire::CircuitBreaker;
    ///
    /// let circuit = CircuitBreaker::builder("api")
    ///     .classify(|ctx| {
    ///         ctx.downcast_ref::<std::io::Error>()
    ///             .map(|e| e.kind() != std::io::ErrorKind::Interrupted)
    ///             .unwrap_or(true)
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert!(circuit.is_closed());
    /// ```
    pub fn classify<F>(self, predicate: F) -> Self
    where
        F: Fn(&FailureContext<'_>) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier(Arc::new(PredicateClassifier::new(predicate)))
    }

    /// Set callback for when circuit opens
    ///
    /// Receives the failure that tripped the circuit and the break duration.
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&FailureContext<'_>, Duration) + Send + Sync + 'static,
    {
        self.callbacks.on_open = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit closes
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_close = Some(Arc::new(f));
        self
    }

    /// Set callback for when circuit enters half-open
    pub fn on_half_open<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_half_open = Some(Arc::new(f));
        self
    }

    /// Build the circuit breaker
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the failure threshold or break duration is zero.
    pub fn build(self) -> Result<CircuitBreaker, ConfigError> {
        self.config.validate()?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let failure_classifier = self
            .failure_classifier
            .unwrap_or_else(|| Arc::new(DefaultClassifier));

        let context = CircuitContext {
            name: self.name,
            config: self.config,
            storage,
            failure_classifier,
        };

        Ok(CircuitBreaker::with_context_and_callbacks(
            context,
            self.callbacks,
        ))
    }
}

impl std::fmt::Debug for CircuitBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("callbacks", &self.callbacks)
            .finish_non_exhaustive()
    }
}
