//! Status responses and the read-only query handler

use crate::{
    CorrelationId, Resolution, SagaBehavior, SagaFault, SagaInstance, SagaState, StatusRequested,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Point-in-time answer to a status query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Queried instance
    pub correlation_id: CorrelationId,
    /// State at query time
    pub current_state: SagaState,
    /// Saga type that answered
    pub saga_type: Box<str>,
    /// Instance creation time (millis since UNIX epoch)
    pub created_at_millis: u64,
    /// Extra fields populated by the saga type
    pub details: BTreeMap<Box<str>, Box<str>>,
}

impl StatusResponse {
    /// Base population: identity, state and timestamps of the snapshot
    pub fn from_instance<D>(saga_type: &str, instance: &SagaInstance<D>) -> Self {
        Self {
            correlation_id: instance.correlation_id(),
            current_state: instance.current_state(),
            saga_type: saga_type.into(),
            created_at_millis: instance.created_at_millis(),
            details: BTreeMap::new(),
        }
    }

    /// Add a saga-specific field
    pub fn with_detail(mut self, key: impl Into<Box<str>>, value: impl Into<Box<str>>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Look up a saga-specific field
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(|v| v.as_ref())
    }

    /// Numeric encoding of the state, for callers that expect it
    pub fn state_code(&self) -> i32 {
        self.current_state.code()
    }
}

/// Builds status responses from resolver outcomes
pub struct StatusQueryHandler<'a, B: SagaBehavior> {
    behavior: &'a B,
}

impl<'a, B: SagaBehavior> StatusQueryHandler<'a, B> {
    /// Handler answering on behalf of `behavior`
    pub fn new(behavior: &'a B) -> Self {
        Self { behavior }
    }

    /// Answer `query` from the instance the resolver found, or fault on a miss.
    ///
    /// The snapshot is owned by this call, so the behavior cannot reach the
    /// stored record.
    pub fn handle(
        &self,
        query: &StatusRequested,
        resolution: Resolution<B::Data>,
    ) -> Result<StatusResponse, SagaFault> {
        let snapshot = match resolution {
            Resolution::Hit(instance) => instance,
            Resolution::Miss => {
                return Err(SagaFault::MissingInstance {
                    correlation_id: query.correlation_id,
                })
            }
        };

        let base = StatusResponse::from_instance(self.behavior.saga_type(), &snapshot);
        let mut response =
            self.behavior
                .on_status(&snapshot, base)
                .map_err(|e| SagaFault::ExtensionFailure {
                    correlation_id: query.correlation_id,
                    reason: e.reason,
                })?;

        // Identity and state are owned by the engine.
        response.correlation_id = snapshot.correlation_id();
        response.current_state = snapshot.current_state();
        Ok(response)
    }
}
