//! Saga instance storage trait

use super::{CorrelationId, SagaInstance, StoreError};

/// Keyed storage of saga instances.
///
/// Every call is atomic with respect to the record it touches. Ordering
/// between a start and a query on the same id is provided on top of this by
/// the [`CorrelationResolver`](crate::CorrelationResolver).
pub trait InstanceStore<D>: Send + Sync + 'static {
    /// Copy of the stored instance, or `None` when the id is unknown
    fn get(&self, correlation_id: CorrelationId) -> Result<Option<SagaInstance<D>>, StoreError>;

    /// Insert a new instance. Fails with [`StoreError::AlreadyExists`] if the id is taken.
    fn create(&self, instance: SagaInstance<D>) -> Result<(), StoreError>;

    /// Whether an instance exists for the id
    fn contains(&self, correlation_id: CorrelationId) -> Result<bool, StoreError> {
        Ok(self.get(correlation_id)?.is_some())
    }

    /// Number of stored instances
    fn len(&self) -> Result<usize, StoreError>;

    /// Whether the store holds no instances
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Ids of every stored instance
    fn correlation_ids(&self) -> Result<Vec<CorrelationId>, StoreError>;
}

/// In-memory instance store. Contents are lost on restart.
pub struct InMemoryStore<D> {
    data: std::sync::RwLock<std::collections::HashMap<CorrelationId, SagaInstance<D>>>,
}

impl<D> InMemoryStore<D> {
    /// Empty store
    pub fn new() -> Self {
        Self {
            data: std::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl<D> Default for InMemoryStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> InstanceStore<D> for InMemoryStore<D>
where
    D: Clone + Send + Sync + 'static,
{
    fn get(&self, correlation_id: CorrelationId) -> Result<Option<SagaInstance<D>>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.get(&correlation_id).cloned())
    }

    fn create(&self, instance: SagaInstance<D>) -> Result<(), StoreError> {
        use std::collections::hash_map::Entry;

        let mut data = self.data.write().map_err(|e| StoreError::Storage(e.to_string().into()))?;
        match data.entry(instance.correlation_id()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(*entry.key())),
            Entry::Vacant(entry) => {
                entry.insert(instance);
                Ok(())
            }
        }
    }

    fn contains(&self, correlation_id: CorrelationId) -> Result<bool, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.contains_key(&correlation_id))
    }

    fn len(&self) -> Result<usize, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.len())
    }

    fn correlation_ids(&self) -> Result<Vec<CorrelationId>, StoreError> {
        let data = self.data.read().map_err(|e| StoreError::Storage(e.to_string().into()))?;
        Ok(data.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SagaState;

    #[test]
    fn test_create_then_get() {
        let store = InMemoryStore::new();
        let id = CorrelationId::new();
        assert!(store.get(id).unwrap().is_none());
        assert!(store.is_empty().unwrap());

        store
            .create(SagaInstance::restore(id, SagaState::Processing, 1, "a"))
            .unwrap();

        let found = store.get(id).unwrap().unwrap();
        assert_eq!(found.correlation_id(), id);
        assert_eq!(*found.data(), "a");
        assert!(store.contains(id).unwrap());
        assert_eq!(store.correlation_ids().unwrap(), vec![id]);
    }

    #[test]
    fn test_create_rejects_existing_id() {
        let store = InMemoryStore::new();
        let id = CorrelationId::new();
        store
            .create(SagaInstance::restore(id, SagaState::Processing, 1, "first"))
            .unwrap();

        let err = store
            .create(SagaInstance::restore(id, SagaState::Processing, 2, "second"))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(dup) if dup == id));

        // First record untouched
        assert_eq!(*store.get(id).unwrap().unwrap().data(), "first");
        assert_eq!(store.len().unwrap(), 1);
    }
}
