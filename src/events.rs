//! Saga events

use super::{Correlated, CorrelationId};
use serde::{Deserialize, Serialize};

/// Event starting a new saga instance under the carried id
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartSaga<P> {
    /// Id of the instance to create
    pub correlation_id: CorrelationId,
    /// Saga-specific initialization data
    pub payload: P,
}

impl<P> StartSaga<P> {
    /// Build a start event
    pub fn new(correlation_id: CorrelationId, payload: P) -> Self {
        Self {
            correlation_id,
            payload,
        }
    }
}

/// Read-only request for an instance's current state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequested {
    /// Id of the instance being queried
    pub correlation_id: CorrelationId,
}

impl StatusRequested {
    /// Build a status query
    pub fn new(correlation_id: CorrelationId) -> Self {
        Self { correlation_id }
    }
}

impl<P> Correlated for StartSaga<P> {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

impl Correlated for StatusRequested {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

/// Inbound events, as delivered by the dispatcher
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SagaEvent<P> {
    /// Create a new instance
    Start(StartSaga<P>),
    /// Query an existing instance
    StatusRequested(StatusRequested),
}

impl<P> SagaEvent<P> {
    /// Registered event type of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Start(_) => EventKind::StartProcessing,
            Self::StatusRequested(_) => EventKind::ProcessingStatusRequested,
        }
    }
}

impl<P> Correlated for SagaEvent<P> {
    fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Start(event) => event.correlation_id,
            Self::StatusRequested(query) => query.correlation_id,
        }
    }
}

impl<P> From<StartSaga<P>> for SagaEvent<P> {
    fn from(event: StartSaga<P>) -> Self {
        Self::Start(event)
    }
}

impl<P> From<StatusRequested> for SagaEvent<P> {
    fn from(query: StatusRequested) -> Self {
        Self::StatusRequested(query)
    }
}

/// Event types a state machine can register transitions for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    /// Creates the instance
    StartProcessing,
    /// Asks for the current state
    ProcessingStatusRequested,
}

impl EventKind {
    /// Every event type
    pub const ALL: &'static [EventKind] = &[
        EventKind::StartProcessing,
        EventKind::ProcessingStatusRequested,
    ];

    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartProcessing => "StartProcessing",
            Self::ProcessingStatusRequested => "ProcessingStatusRequested",
        }
    }

    /// Whether delivering this event creates an instance
    pub fn is_creating(&self) -> bool {
        matches!(self, Self::StartProcessing)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
