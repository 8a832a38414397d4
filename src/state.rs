//! Saga states and the instance record shared by every saga type

use crate::CorrelationId;
use serde::{Deserialize, Serialize};

/// Position of an instance in its state machine.
///
/// The name is the canonical form. The integer code is kept only for
/// boundaries that expect the numeric encoding: codes 1 and 2 are reserved
/// for the framework's initial and final pseudo-states, user states start
/// at 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SagaState {
    /// Start transition has run; the saga is in flight
    Processing,
}

/// Code reserved for the implicit initial condition
pub const INITIAL_STATE_CODE: i32 = 1;
/// Code reserved for a final state
pub const FINAL_STATE_CODE: i32 = 2;

impl SagaState {
    /// Every named state, in declaration order
    pub const ALL: &'static [SagaState] = &[SagaState::Processing];

    /// Canonical name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Processing => "Processing",
        }
    }

    /// Numeric encoding
    pub fn code(&self) -> i32 {
        match self {
            Self::Processing => 3,
        }
    }
}

/// Failed to decode a state from its boundary form
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StateDecodeError {
    /// Code does not name a state
    #[error("unknown state code: {0}")]
    UnknownCode(i32),
    /// Code is reserved for a pseudo-state that is never observable
    #[error("state code {0} is reserved")]
    ReservedCode(i32),
    /// Name does not match any state
    #[error("unknown state name: {0}")]
    UnknownName(Box<str>),
}

impl From<SagaState> for i32 {
    fn from(state: SagaState) -> Self {
        state.code()
    }
}

impl TryFrom<i32> for SagaState {
    type Error = StateDecodeError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        if code == INITIAL_STATE_CODE || code == FINAL_STATE_CODE {
            return Err(StateDecodeError::ReservedCode(code));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.code() == code)
            .ok_or(StateDecodeError::UnknownCode(code))
    }
}

impl std::str::FromStr for SagaState {
    type Err = StateDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.name() == s)
            .ok_or_else(|| StateDecodeError::UnknownName(s.into()))
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A saga instance: identity, position, and the concrete saga's data.
///
/// Instances are only materialised once their start transition has
/// completed, so `current_state` is always a named state and the implicit
/// initial condition never shows up here.
#[derive(Clone, Debug, PartialEq)]
pub struct SagaInstance<D> {
    correlation_id: CorrelationId,
    current_state: SagaState,
    created_at_millis: u64,
    data: D,
}

impl<D> SagaInstance<D> {
    /// Build an instance record. Used by the engine after the start action and
    /// by stores rehydrating persisted records.
    pub fn restore(
        correlation_id: CorrelationId,
        current_state: SagaState,
        created_at_millis: u64,
        data: D,
    ) -> Self {
        Self {
            correlation_id,
            current_state,
            created_at_millis,
            data,
        }
    }

    /// Id assigned at creation
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Current position
    pub fn current_state(&self) -> SagaState {
        self.current_state
    }

    /// Creation time (millis since UNIX epoch)
    pub fn created_at_millis(&self) -> u64 {
        self.created_at_millis
    }

    /// Saga-specific data
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Consume into the saga-specific data
    pub fn into_data(self) -> D {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_code_are_interchangeable() {
        for state in SagaState::ALL {
            assert_eq!(SagaState::try_from(state.code()).unwrap(), *state);
            assert_eq!(state.name().parse::<SagaState>().unwrap(), *state);
        }
        assert_eq!(i32::from(SagaState::Processing), 3);
        assert_eq!(SagaState::Processing.to_string(), "Processing");
    }

    #[test]
    fn test_reserved_and_unknown_codes() {
        assert_eq!(
            SagaState::try_from(INITIAL_STATE_CODE),
            Err(StateDecodeError::ReservedCode(1))
        );
        assert_eq!(
            SagaState::try_from(FINAL_STATE_CODE),
            Err(StateDecodeError::ReservedCode(2))
        );
        assert_eq!(SagaState::try_from(42), Err(StateDecodeError::UnknownCode(42)));
        assert!("Initial".parse::<SagaState>().is_err());
    }

    #[test]
    fn test_instance_accessors() {
        let id = CorrelationId::new();
        let instance = SagaInstance::restore(id, SagaState::Processing, 10, "payload");
        assert_eq!(instance.correlation_id(), id);
        assert_eq!(instance.current_state(), SagaState::Processing);
        assert_eq!(instance.created_at_millis(), 10);
        assert_eq!(*instance.data(), "payload");
    }
}
