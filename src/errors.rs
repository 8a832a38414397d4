//! Error types for dispatch, registration and extension callbacks

use crate::{CorrelationId, EventKind};
use serde::{Deserialize, Serialize};

/// Caller-visible failure of a single dispatched event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SagaFault {
    /// A start event arrived for an id that already has an instance
    #[error("saga instance {correlation_id} already exists")]
    DuplicateCorrelation {
        /// The colliding id
        correlation_id: CorrelationId,
    },
    /// A non-creating event arrived for an id with no instance
    #[error("no saga instance for {correlation_id}")]
    MissingInstance {
        /// The queried id
        correlation_id: CorrelationId,
    },
    /// An extension callback failed; nothing was persisted
    #[error("saga {correlation_id} extension failed: {reason}")]
    ExtensionFailure {
        /// Instance the callback ran for
        correlation_id: CorrelationId,
        /// Error description
        reason: Box<str>,
    },
    /// The instance store failed
    #[error("saga {correlation_id} store error: {reason}")]
    Store {
        /// Instance being read or written
        correlation_id: CorrelationId,
        /// Error description
        reason: Box<str>,
    },
}

/// Fault discriminant, for matching without fields
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// See [`SagaFault::DuplicateCorrelation`]
    DuplicateCorrelation,
    /// See [`SagaFault::MissingInstance`]
    MissingInstance,
    /// See [`SagaFault::ExtensionFailure`]
    ExtensionFailure,
    /// See [`SagaFault::Store`]
    Store,
}

impl SagaFault {
    /// Fault discriminant
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::DuplicateCorrelation { .. } => FaultKind::DuplicateCorrelation,
            Self::MissingInstance { .. } => FaultKind::MissingInstance,
            Self::ExtensionFailure { .. } => FaultKind::ExtensionFailure,
            Self::Store { .. } => FaultKind::Store,
        }
    }

    /// Id the fault is about
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::DuplicateCorrelation { correlation_id }
            | Self::MissingInstance { correlation_id }
            | Self::ExtensionFailure { correlation_id, .. }
            | Self::Store { correlation_id, .. } => *correlation_id,
        }
    }

    /// Check if this is a missing-instance fault
    pub fn is_missing_instance(&self) -> bool {
        matches!(self, Self::MissingInstance { .. })
    }

    /// Check if this is a duplicate start
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateCorrelation { .. })
    }
}

/// Error raised by a saga's extension callbacks
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct ExtensionError {
    /// Error description
    pub reason: Box<str>,
}

impl ExtensionError {
    /// Build from any message
    pub fn new(reason: impl Into<Box<str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Invalid transition table. Fatal at setup: a machine is never built from one.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// An event type has no transition
    #[error("event {0} has no registered transition")]
    Unhandled(EventKind),
    /// Two transitions for the same event from the same source
    #[error("conflicting transitions for event {event} from {source_state}")]
    Conflict {
        /// Event registered twice
        event: EventKind,
        /// Source both registrations share
        source_state: Box<str>,
    },
    /// Event cannot drive the registered transition shape
    #[error("event {event} cannot be used for a {transition} transition")]
    WrongShape {
        /// Offending event
        event: EventKind,
        /// Transition shape it was registered with
        transition: &'static str,
    },
}

/// Instance store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create` found an existing record
    #[error("instance already exists: {0}")]
    AlreadyExists(CorrelationId),
    /// Backend failure
    #[error("Storage error: {0}")]
    Storage(Box<str>),
    /// Record could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(Box<str>),
}

impl StoreError {
    pub(crate) fn into_fault(self, correlation_id: CorrelationId) -> SagaFault {
        match self {
            Self::AlreadyExists(id) => SagaFault::DuplicateCorrelation { correlation_id: id },
            other => SagaFault::Store {
                correlation_id,
                reason: other.to_string().into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_and_id() {
        let id = CorrelationId::new();
        let fault = SagaFault::MissingInstance { correlation_id: id };
        assert_eq!(fault.kind(), FaultKind::MissingInstance);
        assert_eq!(fault.correlation_id(), id);
        assert!(fault.is_missing_instance());
        assert!(!fault.is_duplicate());
    }

    #[test]
    fn test_store_error_mapping() {
        let id = CorrelationId::new();
        assert_eq!(
            StoreError::AlreadyExists(id).into_fault(id).kind(),
            FaultKind::DuplicateCorrelation
        );
        let fault = StoreError::Storage("disk full".into()).into_fault(id);
        assert_eq!(fault.kind(), FaultKind::Store);
        assert!(fault.to_string().contains("disk full"));
    }
}
