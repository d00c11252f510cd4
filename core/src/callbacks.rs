//! Callback system for circuit breaker state transitions

use crate::classifier::FailureContext;
use std::sync::Arc;
use std::time::Duration;

/// Observer fired when the circuit opens, with the tripping error and break duration
pub type OpenCallback = Arc<dyn Fn(&FailureContext<'_>, Duration) + Send + Sync>;

/// Observer fired with the circuit name
pub type StateCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callbacks for circuit breaker events
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<OpenCallback>,
    pub on_close: Option<StateCallback>,
    pub on_half_open: Option<StateCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger_open(&self, ctx: &FailureContext<'_>, break_duration: Duration) {
        if let Some(ref callback) = self.on_open {
            callback(ctx, break_duration);
        }
    }

    pub fn trigger_close(&self, circuit: &str) {
        if let Some(ref callback) = self.on_close {
            callback(circuit);
        }
    }

    pub fn trigger_half_open(&self, circuit: &str) {
        if let Some(ref callback) = self.on_half_open {
            callback(circuit);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
