//! Maps an event's correlation id onto the instance store

use crate::{CorrelationId, InstanceStore, KeyedLocks, SagaFault, SagaInstance, StoreError};
use std::sync::Arc;

/// Outcome of a lookup
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<D> {
    /// An instance exists; this is a copy of it
    Hit(SagaInstance<D>),
    /// No instance exists for the id
    Miss,
}

impl<D> Resolution<D> {
    /// Whether the lookup found an instance
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

/// Translates "event carrying an id" into "instance to operate on".
///
/// Creation holds the id's exclusive lock from the existence check until the
/// new record is stored, so a concurrent lookup sees either nothing or the
/// finished instance, and the build step runs at most once per id.
pub struct CorrelationResolver<D> {
    store: Arc<dyn InstanceStore<D>>,
    locks: KeyedLocks,
}

impl<D: 'static> CorrelationResolver<D> {
    /// Resolver over `store`
    pub fn new(store: Arc<dyn InstanceStore<D>>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn InstanceStore<D>> {
        &self.store
    }

    /// Look up an existing instance under the id's shared lock.
    ///
    /// A miss is a normal outcome, never an instance.
    pub fn lookup(&self, correlation_id: CorrelationId) -> Result<Resolution<D>, SagaFault> {
        let _guard = self.locks.read(correlation_id);
        match self.store.get(correlation_id) {
            Ok(Some(instance)) => Ok(Resolution::Hit(instance)),
            Ok(None) => Ok(Resolution::Miss),
            Err(e) => Err(e.into_fault(correlation_id)),
        }
    }

    /// Create the instance for `correlation_id` using `build`.
    ///
    /// `build` runs only if no instance exists yet, under the id's exclusive
    /// lock. If it fails nothing is stored. An existing id yields
    /// [`SagaFault::DuplicateCorrelation`] without calling `build`.
    pub fn create<F>(
        &self,
        correlation_id: CorrelationId,
        build: F,
    ) -> Result<SagaInstance<D>, SagaFault>
    where
        D: Clone,
        F: FnOnce() -> Result<SagaInstance<D>, SagaFault>,
    {
        let _guard = self.locks.write(correlation_id);

        let exists = self
            .store
            .contains(correlation_id)
            .map_err(|e| e.into_fault(correlation_id))?;
        if exists {
            return Err(SagaFault::DuplicateCorrelation { correlation_id });
        }

        let instance = build()?;
        if instance.correlation_id() != correlation_id {
            return Err(SagaFault::Store {
                correlation_id,
                reason: format!("built instance carries id {}", instance.correlation_id()).into(),
            });
        }

        match self.store.create(instance.clone()) {
            Ok(()) => Ok(instance),
            Err(StoreError::AlreadyExists(_)) => Err(SagaFault::DuplicateCorrelation { correlation_id }),
            Err(e) => Err(e.into_fault(correlation_id)),
        }
    }
}
