//! Circuit breaker implementation using state machines
//!
//! The breaker keeps its state in a dynamic `state-machines` machine guarded by
//! a single mutex. The lock is held for the admission check and for recording
//! an outcome, never while the wrapped operation runs.

use crate::{
    StorageBackend,
    builder::CircuitBuilder,
    callbacks::Callbacks,
    classifier::{FailureClassifier, FailureContext},
    errors::{CircuitError, ConfigError},
};
use parking_lot::Mutex;
use state_machines::state_machine;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Default number of consecutive failures that trips the circuit
pub const DEFAULT_FAILURE_THRESHOLD: usize = 5;

/// Default time the circuit stays open before a trial call
pub const DEFAULT_BREAK_DURATION: Duration = Duration::from_secs(30);

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Consecutive qualifying failures, while Closed, that open the circuit
    pub failure_threshold: usize,

    /// Minimum time the circuit stays Open before a trial call is allowed
    pub break_duration: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            break_duration: DEFAULT_BREAK_DURATION,
        }
    }
}

impl Config {
    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::ZeroFailureThreshold);
        }
        if self.break_duration.is_zero() {
            return Err(ConfigError::ZeroBreakDuration);
        }
        Ok(())
    }
}

/// Observable circuit state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls flow through; qualifying failures are counted
    Closed,
    /// Calls are rejected until the break duration elapses
    Open,
    /// One trial call is testing whether the service recovered
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }

    fn from_name(name: &str) -> Self {
        match name {
            "Closed" => CircuitState::Closed,
            "Open" => CircuitState::Open,
            "HalfOpen" => CircuitState::HalfOpen,
            other => unreachable!("unknown circuit state {other}"),
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Circuit breaker context - shared data across all states
#[derive(Clone)]
pub struct CircuitContext {
    pub name: String,
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    pub failure_classifier: Arc<dyn FailureClassifier>,
}

impl Default for CircuitContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            config: Config::default(),
            storage: Arc::new(crate::MemoryStorage::new()),
            failure_classifier: Arc::new(crate::DefaultClassifier),
        }
    }
}

impl fmt::Debug for CircuitContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitContext")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("storage", &self.storage)
            .field("failure_classifier", &self.failure_classifier)
            .finish()
    }
}

/// Data specific to the Open state
#[derive(Debug, Clone, Default)]
pub struct OpenData {
    /// Storage clock reading when the circuit opened
    pub opened_at: Duration,
}

/// Data specific to the HalfOpen state
#[derive(Debug, Clone, Default)]
pub struct HalfOpenData {
    /// A trial call holds the single HalfOpen slot
    pub trial_in_flight: bool,
    /// The trial call succeeded
    pub trial_passed: bool,
}

state_machine! {
    name: Circuit,
    context: CircuitContext,
    dynamic: true,

    initial: Closed,
    states: [
        Closed,
        Open(OpenData),
        HalfOpen(HalfOpenData),
    ],
    events {
        trip {
            guards: [should_open],
            transition: { from: [Closed, HalfOpen], to: Open }
        }
        attempt_reset {
            guards: [timeout_elapsed],
            transition: { from: Open, to: HalfOpen }
        }
        close {
            guards: [should_close],
            transition: { from: HalfOpen, to: Closed }
        }
    }
}

impl Circuit<Closed> {
    /// The failure streak reached the threshold
    fn should_open(&self, ctx: &CircuitContext) -> bool {
        ctx.storage.consecutive_failures(&ctx.name) >= ctx.config.failure_threshold
    }
}

impl Circuit<HalfOpen> {
    /// Only a failed trial reopens the circuit
    fn should_open(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .is_some_and(|data| data.trial_in_flight)
    }

    fn should_close(&self, _ctx: &CircuitContext) -> bool {
        self.state_data_half_open()
            .is_some_and(|data| data.trial_passed)
    }
}

impl Circuit<Open> {
    /// Check if the break duration has elapsed for Open -> HalfOpen transition
    fn timeout_elapsed(&self, ctx: &CircuitContext) -> bool {
        let Some(data) = self.state_data_open() else {
            return false;
        };
        let elapsed = ctx.storage.monotonic_time().saturating_sub(data.opened_at);
        elapsed >= ctx.config.break_duration
    }
}

/// State machine plus the epoch of its current state
///
/// The epoch moves on every transition and on reset. An outcome only drives
/// the machine if the epoch it was admitted under is still current.
struct Guarded {
    machine: DynamicCircuit,
    epoch: u64,
}

/// How a call got past the gate, and under which epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Closed { epoch: u64 },
    Trial { epoch: u64 },
}

impl Admission {
    fn epoch(self) -> u64 {
        match self {
            Admission::Closed { epoch } | Admission::Trial { epoch } => epoch,
        }
    }
}

/// Holds the HalfOpen trial slot for the duration of a trial call
///
/// Dropping an armed slot (cancelled future, panicking operation, ignored
/// failure) frees it so the next caller can run the trial. A slot from an
/// earlier epoch leaves the current trial alone.
struct TrialSlot<'a> {
    inner: &'a Mutex<Guarded>,
    epoch: u64,
    armed: bool,
}

impl<'a> TrialSlot<'a> {
    fn new(inner: &'a Mutex<Guarded>, admission: Admission) -> Self {
        Self {
            inner,
            epoch: admission.epoch(),
            armed: matches!(admission, Admission::Trial { .. }),
        }
    }

    /// The trial reached a verdict; the state machine takes over
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.epoch != self.epoch {
            return;
        }
        if inner.machine.current_state() == "HalfOpen"
            && let Some(data) = inner.machine.half_open_data_mut()
        {
            data.trial_in_flight = false;
        }
    }
}

/// Circuit breaker public API
///
/// Share one breaker per downstream dependency, by reference or `Arc`.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use tripwire::{CircuitBreaker, CircuitError};
///
/// # async fn example() -> Result<(), tripwire::ConfigError> {
/// let breaker = CircuitBreaker::builder("inventory")
///     .failure_threshold(2)
///     .break_duration(Duration::from_secs(5))
///     .build()?;
///
/// match breaker.execute(|| async { Err::<(), _>("service failed!") }).await {
///     Err(CircuitError::Failure(e)) => println!("call failed: {e}"),
///     Err(CircuitError::Open { .. }) => println!("circuit open, skipping"),
///     _ => {}
/// }
/// # Ok(())
/// # }
/// ```
pub struct CircuitBreaker {
    inner: Mutex<Guarded>,
    context: CircuitContext,
    callbacks: Callbacks,
}

impl CircuitBreaker {
    /// Create a circuit breaker that counts every failure (use builder() for more options)
    pub fn new(name: impl Into<String>, config: Config) -> Result<Self, ConfigError> {
        CircuitBuilder::new(name).config(config).build()
    }

    /// Create a circuit breaker with custom context and callbacks (used by builder)
    pub(crate) fn with_context_and_callbacks(
        context: CircuitContext,
        callbacks: Callbacks,
    ) -> Self {
        let inner = Mutex::new(Guarded {
            machine: DynamicCircuit::new(context.clone()),
            epoch: 0,
        });

        Self {
            inner,
            context,
            callbacks,
        }
    }

    /// Create a new circuit breaker builder
    pub fn builder(name: impl Into<String>) -> CircuitBuilder {
        CircuitBuilder::new(name)
    }

    /// Run `operation` under circuit breaker protection
    ///
    /// # Errors
    ///
    /// - [`CircuitError::Open`] if the circuit is open (or a trial call is
    ///   already running); `operation` is not invoked.
    /// - [`CircuitError::Failure`] if `operation` failed and the failure
    ///   counted toward tripping.
    /// - [`CircuitError::Ignored`] if `operation` failed and the classifier
    ///   excluded the failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display + 'static,
    {
        let (admission, entered_half_open) = match self.admit() {
            Ok(admitted) => admitted,
            Err(retry_after) => {
                debug!(circuit = %self.context.name, ?retry_after, "circuit open, rejecting call");
                return Err(CircuitError::Open {
                    circuit: self.context.name.clone(),
                    retry_after,
                });
            }
        };

        let mut trial = TrialSlot::new(&self.inner, admission);
        if entered_half_open {
            info!(circuit = %self.context.name, "circuit half-open, running trial call");
            self.callbacks.trigger_half_open(&self.context.name);
        }

        let start = self.context.storage.monotonic_time();

        match operation().await {
            Ok(value) => {
                trial.disarm();
                self.record_success(admission);
                Ok(value)
            }
            Err(e) => {
                let ctx = FailureContext {
                    circuit_name: &self.context.name,
                    error: &e,
                    reason: &e,
                    elapsed: self.context.storage.monotonic_time().saturating_sub(start),
                };

                if !self.context.failure_classifier.should_trip(&ctx) {
                    debug!(circuit = %self.context.name, error = %e, "failure not counted");
                    drop(trial);
                    return Err(CircuitError::Ignored(e));
                }

                trial.disarm();
                if self.record_failure(admission) {
                    self.callbacks
                        .trigger_open(&ctx, self.context.config.break_duration);
                }

                Err(CircuitError::Failure(e))
            }
        }
    }

    /// Decide whether a call may run; on rejection returns the time left in the break
    fn admit(&self) -> Result<(Admission, bool), Duration> {
        let mut inner = self.inner.lock();
        let epoch = inner.epoch;

        match CircuitState::from_name(inner.machine.current_state()) {
            CircuitState::Closed => Ok((Admission::Closed { epoch }, false)),
            CircuitState::Open => {
                // The transition is the compare-and-set: one caller wins the trial.
                if inner.machine.handle(CircuitEvent::AttemptReset).is_err() {
                    return Err(self.remaining_break(&inner.machine));
                }
                inner.epoch += 1;
                if let Some(data) = inner.machine.half_open_data_mut() {
                    data.trial_in_flight = true;
                }
                Ok((Admission::Trial { epoch: inner.epoch }, true))
            }
            CircuitState::HalfOpen => match inner.machine.half_open_data_mut() {
                Some(data) if !data.trial_in_flight => {
                    data.trial_in_flight = true;
                    Ok((Admission::Trial { epoch }, false))
                }
                _ => Err(Duration::ZERO),
            },
        }
    }

    fn remaining_break(&self, machine: &DynamicCircuit) -> Duration {
        machine
            .open_data()
            .map(|data| {
                let elapsed = self
                    .context
                    .storage
                    .monotonic_time()
                    .saturating_sub(data.opened_at);
                self.context.config.break_duration.saturating_sub(elapsed)
            })
            .unwrap_or(Duration::ZERO)
    }

    fn record_success(&self, admission: Admission) {
        let closed = {
            let mut inner = self.inner.lock();
            if inner.epoch != admission.epoch() {
                debug!(circuit = %self.context.name, "late success after circuit changed state");
                return;
            }

            match (CircuitState::from_name(inner.machine.current_state()), admission) {
                (CircuitState::Closed, Admission::Closed { .. }) => {
                    self.context.storage.record_success(&self.context.name);
                    false
                }
                (CircuitState::HalfOpen, Admission::Trial { .. }) => {
                    if let Some(data) = inner.machine.half_open_data_mut() {
                        data.trial_passed = true;
                    }
                    if inner.machine.handle(CircuitEvent::Close).is_ok() {
                        inner.epoch += 1;
                        self.context.storage.clear(&self.context.name);
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };

        if closed {
            info!(circuit = %self.context.name, "circuit closed, normal operation resumed");
            self.callbacks.trigger_close(&self.context.name);
        }
    }

    /// Count a qualifying failure; returns true if the circuit opened
    fn record_failure(&self, admission: Admission) -> bool {
        let mut inner = self.inner.lock();

        let counts = inner.epoch == admission.epoch()
            && matches!(
                (CircuitState::from_name(inner.machine.current_state()), admission),
                (CircuitState::Closed, Admission::Closed { .. })
                    | (CircuitState::HalfOpen, Admission::Trial { .. })
            );
        if !counts {
            debug!(circuit = %self.context.name, "late failure after circuit changed state");
            return false;
        }

        let failures = self.context.storage.record_failure(&self.context.name);
        let threshold = self.context.config.failure_threshold;

        if inner.machine.handle(CircuitEvent::Trip).is_ok() {
            inner.epoch += 1;
            let now = self.context.storage.monotonic_time();
            if let Some(data) = inner.machine.open_data_mut() {
                data.opened_at = now;
            }
            warn!(
                circuit = %self.context.name,
                failures,
                threshold,
                break_duration = ?self.context.config.break_duration,
                "circuit opened"
            );
            true
        } else {
            trace!(circuit = %self.context.name, failures, threshold, "failure recorded");
            false
        }
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        CircuitState::from_name(self.inner.lock().machine.current_state())
    }

    /// Get current state name
    pub fn state_name(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Current streak of consecutive qualifying failures
    pub fn consecutive_failures(&self) -> usize {
        self.context.storage.consecutive_failures(&self.context.name)
    }

    /// Storage clock reading when the circuit last opened, while it is Open
    pub fn opened_at(&self) -> Option<Duration> {
        self.inner.lock().machine.open_data().map(|data| data.opened_at)
    }

    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    /// Clear the failure streak and force the circuit Closed
    pub fn reset(&self) {
        let was_closed = {
            let mut inner = self.inner.lock();
            let was_closed = inner.machine.current_state() == "Closed";
            self.context.storage.clear(&self.context.name);
            inner.machine = DynamicCircuit::new(self.context.clone());
            inner.epoch += 1;
            was_closed
        };

        if !was_closed {
            info!(circuit = %self.context.name, "circuit manually reset");
            self.callbacks.trigger_close(&self.context.name);
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("context", &self.context)
            .field("callbacks", &self.callbacks)
            .finish()
    }
}
