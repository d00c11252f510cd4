//! Basic circuit breaker usage example
//!
//! Run with `RUST_LOG=tripwire=debug` to see the breaker's own log events.

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tripwire::{CircuitBreaker, CircuitError, ManualClock, MemoryStorage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Circuit Breaker Basic Example ===\n");

    // A manual clock keeps the walkthrough deterministic
    let clock = Arc::new(ManualClock::new());
    let circuit = CircuitBreaker::builder("payment_api")
        .failure_threshold(2)
        .break_duration(Duration::from_secs(5))
        .storage(Arc::new(MemoryStorage::with_clock(clock.clone())))
        .on_open(|ctx, duration| {
            println!("🔴 Circuit '{}' opened for {:?}: {}", ctx.circuit_name, duration, ctx.reason)
        })
        .on_close(|name| println!("🟢 Circuit '{}' closed", name))
        .on_half_open(|name| println!("🟡 Circuit '{}' half-open, testing...", name))
        .build()?;

    // Scripted outcomes: (seconds since start, service healthy?)
    let script = [
        (0, true),
        (1, false),
        (2, false),
        (3, true),
        (8, false),
        (14, true),
        (15, true),
    ];

    for (i, (at, healthy)) in script.into_iter().enumerate() {
        clock.set(Duration::from_secs(at));

        let result = circuit
            .execute(|| async move {
                if healthy {
                    Ok(format!("Payment {} accepted", i + 1))
                } else {
                    Err("Service failed!".to_string())
                }
            })
            .await;

        match result {
            Ok(receipt) => println!("t={at:>2}s ✓ {receipt}"),
            Err(CircuitError::Open { retry_after, .. }) => {
                println!("t={at:>2}s ✗ circuit open, skipping (retry after {retry_after:?})")
            }
            Err(e) => println!("t={at:>2}s ✗ {e}"),
        }
        println!("      state: {}", circuit.state_name());
    }

    Ok(())
}
