//! Console demo
//!
//! Publishes a start event, waits, asks for the saga's status, then asks
//! about an id that was never started.
//!
//! ```text
//! RUST_LOG=info cargo run --example console
//! ```

use saga_correlation::testing::{DemoSaga, DemoStart};
use saga_correlation::{
    now_millis, BusConfig, BusError, CorrelationId, InMemoryStore, SagaBus, StartSaga,
    StateMachine,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Preparing Demo");

    // In-memory instances; swap for LmdbStore (feature "lmdb") to keep them across restarts
    let machine = Arc::new(StateMachine::new(DemoSaga, Arc::new(InMemoryStore::new())));
    let bus = SagaBus::spawn(
        machine,
        BusConfig {
            request_timeout: Duration::from_secs(5),
            ..BusConfig::default()
        },
    );

    println!("Initializing Base Saga");

    let correlation_id = CorrelationId::new();
    let start = StartSaga::new(
        correlation_id,
        DemoStart {
            emp_code: "001".into(),
            activity_time_millis: now_millis(),
        },
    );
    if let Err(e) = bus.publish(start).await {
        println!("{e}");
        return;
    }
    println!("Request sent, now we'll check the state shortly");
    tokio::time::sleep(Duration::from_millis(500)).await;

    println!("Making get status request");
    match bus.request_status(correlation_id).await {
        Ok(response) => println!(
            "Status is: {} ({})",
            response.current_state,
            response.state_code()
        ),
        Err(e) => println!("{e}"),
    }

    let unknown = CorrelationId::new();
    println!("Making get status request for unknown saga {unknown}");
    match bus.request_status(unknown).await {
        Ok(response) => println!("Unexpected status: {}", response.current_state),
        Err(BusError::Fault(fault)) => println!("Fault: {:?} ({fault})", fault.kind()),
        Err(e) => println!("{e}"),
    }

    let stats = bus.machine().stats().snapshot();
    tracing::info!(?stats, "Demo finished");
    bus.shutdown().await;

    println!("Done");
}
