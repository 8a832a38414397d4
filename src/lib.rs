//! Correlation-Based Saga State Machine
//!
//! A generic saga engine: a start event creates an instance keyed by its
//! correlation id, status queries read that instance back at any time, and a
//! query for an id that was never started is answered with an explicit
//! `MissingInstance` fault rather than by creating state.
//!
//! Concrete saga types implement [`SagaBehavior`]; the engine owns identity,
//! state, storage and per-id ordering.
//!
//! # Quick Start
//!
//! ```rust
//! use saga_correlation::{
//!     CorrelationId, InMemoryStore, SagaBehavior, SagaState, StartSaga, StateMachine,
//!     StatusRequested,
//! };
//! use std::sync::Arc;
//!
//! struct Noop;
//!
//! impl SagaBehavior for Noop {
//!     type Data = ();
//!     type StartPayload = ();
//!     fn saga_type(&self) -> &str { "noop" }
//! }
//!
//! let machine = StateMachine::new(Noop, Arc::new(InMemoryStore::new()));
//! let id = CorrelationId::new();
//!
//! machine.start(StartSaga::new(id, ())).unwrap();
//! let status = machine.status(&StatusRequested::new(id)).unwrap();
//! assert_eq!(status.current_state, SagaState::Processing);
//!
//! let missing = machine.status(&StatusRequested::new(CorrelationId::new()));
//! assert!(missing.unwrap_err().is_missing_instance());
//! ```

#![warn(missing_docs)]

// === Core Types ===
mod context;
mod errors;
mod events;
mod state;

// === Traits ===
mod traits;

// === Engine ===
mod locks;
mod machine;
mod resolver;
mod status;
mod transitions;

// === Storage ===
#[cfg(feature = "lmdb")]
mod lmdb;
mod store;

// === Delivery ===
mod bus;

// === Observability ===
mod observer;
mod stats;

// === Test Support ===
#[cfg(any(test, feature = "test-harness"))]
pub mod testing;

// === Re-exports ===

// Types
pub use context::{now_millis, Correlated, CorrelationId};
pub use state::{SagaInstance, SagaState, StateDecodeError, FINAL_STATE_CODE, INITIAL_STATE_CODE};

// Events
pub use events::{EventKind, SagaEvent, StartSaga, StatusRequested};

// Errors
pub use errors::{ExtensionError, FaultKind, RegistrationError, SagaFault, StoreError};

// Traits
pub use traits::SagaBehavior;

// Engine
pub use locks::{KeyGuard, KeyedLocks};
pub use machine::{Dispatched, StateMachine};
pub use resolver::{CorrelationResolver, Resolution};
pub use status::{StatusQueryHandler, StatusResponse};
pub use transitions::{Effect, Source, Transition, TransitionTable, Transitions};

// Storage
#[cfg(feature = "lmdb")]
pub use lmdb::{LmdbConfig, LmdbStore};
pub use store::{InMemoryStore, InstanceStore};

// Delivery
pub use bus::{BusConfig, BusError, SagaBus};

// Observability
pub use observer::{NoOpObserver, SagaObserver, TracingObserver};
pub use stats::{EngineStats, EngineStatsSnapshot};
