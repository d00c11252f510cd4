//! Tripwire - async circuit breaker guard
//!
//! This crate provides a circuit breaker for unreliable remote calls:
//! - State machine for the breaker lifecycle (Closed → Open → HalfOpen)
//! - A single trial call decides whether a HalfOpen circuit closes or reopens
//! - Failure classification so caller-side errors don't trip the circuit
//! - Observer callbacks on every state transition
//! - Monotonic time tracking, swappable for a manual clock in tests
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tripwire::{CircuitBreaker, CircuitError};
//!
//! # async fn example() -> Result<(), tripwire::ConfigError> {
//! let circuit = CircuitBreaker::builder("my_service")
//!     .failure_threshold(2)
//!     .break_duration(Duration::from_secs(5))
//!     .on_open(|ctx, duration| println!("Circuit opened for {:?}: {}", duration, ctx.reason))
//!     .on_close(|name| println!("Circuit {} closed", name))
//!     .build()?;
//!
//! // Execute with circuit protection
//! let result = circuit
//!     .execute(|| async {
//!         // Your service call here
//!         Ok::<_, String>("success")
//!     })
//!     .await;
//!
//! match result {
//!     Ok(value) => println!("got {}", value),
//!     Err(CircuitError::Open { .. }) => println!("circuit is open, skipping call"),
//!     Err(e) => println!("call failed: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod callbacks;
pub mod circuit;
pub mod classifier;
pub mod clock;
pub mod errors;
pub mod storage;

pub use builder::CircuitBuilder;
pub use callbacks::Callbacks;
pub use circuit::{CircuitBreaker, CircuitState, Config};
pub use classifier::{DefaultClassifier, FailureClassifier, FailureContext, PredicateClassifier};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use errors::{CircuitError, ConfigError};
pub use storage::{MemoryStorage, StorageBackend};
