//! Generic correlation-based state machine

use crate::{
    now_millis, Correlated, CorrelationId, CorrelationResolver, EngineStats, InstanceStore,
    SagaBehavior, SagaEvent, SagaFault, SagaInstance, SagaObserver, SagaState, StartSaga,
    StatusQueryHandler, StatusRequested, StatusResponse, TracingObserver, TransitionTable,
    Transitions,
};
use std::sync::Arc;

/// Result of a successfully dispatched event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A start event created the instance
    Started {
        /// The new instance
        correlation_id: CorrelationId,
        /// State it landed in
        state: SagaState,
    },
    /// A status query was answered
    Status(StatusResponse),
}

/// Runs a saga type's transitions against a keyed instance store.
///
/// The machine owns no threads. Call [`dispatch`](Self::dispatch) (or
/// [`start`](Self::start) / [`status`](Self::status)) from whatever delivers
/// events; calls for different correlation ids run in parallel, calls for
/// the same id are ordered by the resolver's key lock.
pub struct StateMachine<B: SagaBehavior> {
    behavior: B,
    transitions: Transitions,
    resolver: CorrelationResolver<B::Data>,
    observer: Arc<dyn SagaObserver>,
    stats: Arc<EngineStats>,
    clock: fn() -> u64,
}

impl<B: SagaBehavior> StateMachine<B> {
    /// Machine with the standard transitions over `store`
    pub fn new(behavior: B, store: Arc<dyn InstanceStore<B::Data>>) -> Self {
        Self::with_transitions(behavior, store, TransitionTable::standard())
    }

    /// Machine with a custom, already validated, transition table
    pub fn with_transitions(
        behavior: B,
        store: Arc<dyn InstanceStore<B::Data>>,
        transitions: Transitions,
    ) -> Self {
        Self {
            behavior,
            transitions,
            resolver: CorrelationResolver::new(store),
            observer: Arc::new(TracingObserver),
            stats: Arc::new(EngineStats::new()),
            clock: now_millis,
        }
    }

    /// Replace the observer
    pub fn with_observer(mut self, observer: Arc<dyn SagaObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Replace the clock (millis since UNIX epoch)
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.clock = clock;
        self
    }

    /// The saga type's behavior
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    /// Registered transitions
    pub fn transitions(&self) -> &Transitions {
        &self.transitions
    }

    /// Counters
    pub fn stats(&self) -> &Arc<EngineStats> {
        &self.stats
    }

    /// Instance store
    pub fn store(&self) -> &Arc<dyn InstanceStore<B::Data>> {
        self.resolver.store()
    }

    /// Handle one inbound event
    pub fn dispatch(&self, event: SagaEvent<B::StartPayload>) -> Result<Dispatched, SagaFault> {
        tracing::debug!(
            correlation_id = %event.correlation_id(),
            saga_type = %self.behavior.saga_type(),
            event = %event.kind(),
            "Dispatching saga event"
        );
        match event {
            SagaEvent::Start(start) => {
                let correlation_id = start.correlation_id;
                let state = self.start(start)?;
                Ok(Dispatched::Started {
                    correlation_id,
                    state,
                })
            }
            SagaEvent::StatusRequested(query) => self.status(&query).map(Dispatched::Status),
        }
    }

    /// Run the start transition: create the instance, call
    /// [`SagaBehavior::on_start`], and store it in the target state.
    ///
    /// Nothing is stored if the callback fails. A second start for the same
    /// id is rejected with [`SagaFault::DuplicateCorrelation`] and leaves the
    /// first instance untouched.
    pub fn start(&self, event: StartSaga<B::StartPayload>) -> Result<SagaState, SagaFault> {
        let correlation_id = event.correlation_id;
        let saga_type = self.behavior.saga_type();
        let target = self.transitions.start_target();
        EngineStats::bump(&self.stats.starts_received);

        let created = self.resolver.create(correlation_id, || {
            let mut data = B::Data::default();
            self.behavior
                .on_start(&mut data, &event)
                .map_err(|e| SagaFault::ExtensionFailure {
                    correlation_id,
                    reason: e.reason,
                })?;
            Ok(SagaInstance::restore(
                correlation_id,
                target,
                (self.clock)(),
                data,
            ))
        });

        match created {
            Ok(instance) => {
                EngineStats::bump(&self.stats.instances_created);
                self.observer
                    .on_saga_started(saga_type, correlation_id, instance.current_state());
                Ok(instance.current_state())
            }
            Err(fault) => {
                if fault.is_duplicate() {
                    EngineStats::bump(&self.stats.duplicate_starts);
                    self.observer.on_duplicate_start(saga_type, correlation_id);
                } else {
                    EngineStats::bump(&self.stats.failed_starts);
                    self.observer.on_start_failed(saga_type, correlation_id, &fault);
                }
                Err(fault)
            }
        }
    }

    /// Answer a status query from a snapshot of the instance.
    ///
    /// Never creates or modifies an instance. An unknown id is answered with
    /// [`SagaFault::MissingInstance`].
    pub fn status(&self, query: &StatusRequested) -> Result<StatusResponse, SagaFault> {
        let correlation_id = query.correlation_id;
        let saga_type = self.behavior.saga_type();
        EngineStats::bump(&self.stats.queries_received);

        let answered = self
            .resolver
            .lookup(correlation_id)
            .and_then(|resolution| StatusQueryHandler::new(&self.behavior).handle(query, resolution));

        match &answered {
            Ok(response) => {
                EngineStats::bump(&self.stats.queries_answered);
                self.observer
                    .on_status_answered(saga_type, correlation_id, response.current_state);
            }
            Err(fault) if fault.is_missing_instance() => {
                EngineStats::bump(&self.stats.missing_instances);
                self.observer.on_missing_instance(saga_type, correlation_id);
            }
            Err(fault) => {
                EngineStats::bump(&self.stats.failed_queries);
                self.observer.on_status_failed(saga_type, correlation_id, fault);
            }
        }
        answered
    }

    /// Copy of the stored instance, if any
    pub fn instance(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<Option<SagaInstance<B::Data>>, SagaFault> {
        self.store()
            .get(correlation_id)
            .map_err(|e| e.into_fault(correlation_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DemoData, DemoSaga, DemoStart, FailingSaga, RecordingObserver};
    use crate::{ExtensionError, FaultKind, InMemoryStore, StoreError};

    /// Store whose backend is gone: every call fails
    struct UnavailableStore;

    fn unavailable() -> StoreError {
        StoreError::Storage("lock poisoned".into())
    }

    impl InstanceStore<DemoData> for UnavailableStore {
        fn get(&self, _: CorrelationId) -> Result<Option<SagaInstance<DemoData>>, StoreError> {
            Err(unavailable())
        }

        fn create(&self, _: SagaInstance<DemoData>) -> Result<(), StoreError> {
            Err(unavailable())
        }

        fn len(&self) -> Result<usize, StoreError> {
            Err(unavailable())
        }

        fn correlation_ids(&self) -> Result<Vec<CorrelationId>, StoreError> {
            Err(unavailable())
        }
    }

    /// Saga whose status hook always fails
    struct StatusHookFails;

    impl SagaBehavior for StatusHookFails {
        type Data = ();
        type StartPayload = ();

        fn saga_type(&self) -> &str {
            "status_hook_fails"
        }

        fn on_status(
            &self,
            _snapshot: &SagaInstance<()>,
            _response: StatusResponse,
        ) -> Result<StatusResponse, ExtensionError> {
            Err(ExtensionError::new("status hook failed"))
        }
    }

    fn fixed_clock() -> u64 {
        1_000
    }

    fn demo_machine() -> StateMachine<DemoSaga> {
        StateMachine::new(DemoSaga, Arc::new(InMemoryStore::new())).with_clock(fixed_clock)
    }

    fn start_event(id: CorrelationId, emp_code: &str) -> StartSaga<DemoStart> {
        StartSaga::new(
            id,
            DemoStart {
                emp_code: emp_code.into(),
                activity_time_millis: 42,
            },
        )
    }

    #[test]
    fn test_start_then_status() {
        let machine = demo_machine();
        let id = CorrelationId::new();

        let started = machine.dispatch(start_event(id, "001").into()).unwrap();
        assert_eq!(
            started,
            Dispatched::Started {
                correlation_id: id,
                state: SagaState::Processing
            }
        );

        let response = machine.status(&StatusRequested::new(id)).unwrap();
        assert_eq!(response.correlation_id, id);
        assert_eq!(response.current_state, SagaState::Processing);
        assert_eq!(response.created_at_millis, 1_000);
        assert_eq!(response.detail("emp_code"), Some("001"));

        let stored = machine.instance(id).unwrap().unwrap();
        assert_eq!(stored.data().emp_code, "001");
    }

    #[test]
    fn test_status_for_unknown_id_is_missing_instance() {
        let machine = demo_machine();
        let id = CorrelationId::new();

        let fault = machine
            .dispatch(SagaEvent::StatusRequested(StatusRequested::new(id)))
            .unwrap_err();
        assert_eq!(fault.kind(), FaultKind::MissingInstance);
        assert_eq!(fault.correlation_id(), id);
        assert!(machine.instance(id).unwrap().is_none());
        assert_eq!(machine.stats().snapshot().missing_instances, 1);
    }

    #[test]
    fn test_duplicate_start_keeps_first_instance() {
        let machine = demo_machine();
        let id = CorrelationId::new();

        machine.start(start_event(id, "first")).unwrap();
        let fault = machine.start(start_event(id, "second")).unwrap_err();

        assert_eq!(fault, SagaFault::DuplicateCorrelation { correlation_id: id });
        assert_eq!(machine.instance(id).unwrap().unwrap().data().emp_code, "first");
        assert_eq!(machine.store().len().unwrap(), 1);

        let stats = machine.stats().snapshot();
        assert_eq!(stats.starts_received, 2);
        assert_eq!(stats.instances_created, 1);
        assert_eq!(stats.duplicate_starts, 1);
    }

    #[test]
    fn test_failed_action_persists_nothing() {
        let machine = StateMachine::new(FailingSaga, Arc::new(InMemoryStore::new()));
        let id = CorrelationId::new();

        let fault = machine.start(StartSaga::new(id, ())).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::ExtensionFailure);
        assert!(machine.instance(id).unwrap().is_none());
        assert_eq!(
            machine.status(&StatusRequested::new(id)).unwrap_err().kind(),
            FaultKind::MissingInstance
        );
        assert_eq!(machine.stats().snapshot().failed_starts, 1);
    }

    #[test]
    fn test_repeated_queries_are_identical() {
        let machine = demo_machine();
        let id = CorrelationId::new();
        machine.start(start_event(id, "007")).unwrap();
        let before = machine.instance(id).unwrap();

        let query = StatusRequested::new(id);
        let first = machine.status(&query).unwrap();
        for _ in 0..10 {
            assert_eq!(machine.status(&query).unwrap(), first);
        }
        assert_eq!(machine.instance(id).unwrap(), before);
    }

    #[test]
    fn test_observer_sees_every_outcome() {
        let observer = Arc::new(RecordingObserver::default());
        let machine = demo_machine().with_observer(observer.clone());
        let id = CorrelationId::new();
        let unknown = CorrelationId::new();

        machine.start(start_event(id, "a")).unwrap();
        let _ = machine.start(start_event(id, "a"));
        machine.status(&StatusRequested::new(id)).unwrap();
        let _ = machine.status(&StatusRequested::new(unknown));

        assert_eq!(
            observer.events(),
            vec![
                format!("started:{id}:Processing"),
                format!("duplicate:{id}"),
                format!("status:{id}:Processing"),
                format!("missing:{unknown}"),
            ]
        );
    }

    #[test]
    fn test_custom_transition_table() {
        let transitions = TransitionTable::new()
            .initially(crate::EventKind::StartProcessing, SagaState::Processing)
            .during_any_respond(crate::EventKind::ProcessingStatusRequested)
            .build()
            .unwrap();
        let machine =
            StateMachine::with_transitions(DemoSaga, Arc::new(InMemoryStore::new()), transitions);
        let id = CorrelationId::new();
        assert_eq!(machine.start(start_event(id, "x")).unwrap(), SagaState::Processing);
        assert_eq!(machine.transitions().iter().count(), 2);
    }

    #[test]
    fn test_store_failure_reaches_caller() {
        let observer = Arc::new(RecordingObserver::default());
        let machine = StateMachine::new(DemoSaga, Arc::new(UnavailableStore))
            .with_observer(observer.clone());
        let id = CorrelationId::new();

        let fault = machine.start(start_event(id, "001")).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Store);
        assert_eq!(fault.correlation_id(), id);
        assert!(fault.to_string().contains("lock poisoned"));

        let fault = machine
            .dispatch(SagaEvent::StatusRequested(StatusRequested::new(id)))
            .unwrap_err();
        assert_eq!(fault.kind(), FaultKind::Store);
        assert!(!fault.is_missing_instance());

        let stats = machine.stats().snapshot();
        assert_eq!(stats.failed_starts, 1);
        assert_eq!(stats.instances_created, 0);
        assert_eq!(stats.failed_queries, 1);
        assert_eq!(stats.missing_instances, 0);
        assert_eq!(
            observer.events(),
            vec![format!("start_failed:{id}"), format!("status_failed:{id}")]
        );
    }

    #[test]
    fn test_status_hook_failure_is_reported() {
        let observer = Arc::new(RecordingObserver::default());
        let machine = StateMachine::new(StatusHookFails, Arc::new(InMemoryStore::new()))
            .with_observer(observer.clone());
        let id = CorrelationId::new();
        machine.start(StartSaga::new(id, ())).unwrap();

        let fault = machine.status(&StatusRequested::new(id)).unwrap_err();
        assert_eq!(
            fault,
            SagaFault::ExtensionFailure {
                correlation_id: id,
                reason: "status hook failed".into()
            }
        );

        // The instance itself is untouched.
        assert_eq!(
            machine.instance(id).unwrap().unwrap().current_state(),
            SagaState::Processing
        );

        let stats = machine.stats().snapshot();
        assert_eq!(stats.queries_received, 1);
        assert_eq!(stats.queries_answered, 0);
        assert_eq!(stats.failed_queries, 1);
        assert_eq!(
            observer.events(),
            vec![
                format!("started:{id}:Processing"),
                format!("status_failed:{id}")
            ]
        );
    }
}
