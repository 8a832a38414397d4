//! Ready-made sagas and observers for tests and demos

use crate::{
    CorrelationId, ExtensionError, SagaBehavior, SagaFault, SagaInstance, SagaObserver, SagaState,
    StartSaga, StatusResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Start payload of [`DemoSaga`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoStart {
    /// Employee code being processed
    pub emp_code: String,
    /// When the activity happened (millis since UNIX epoch)
    pub activity_time_millis: u64,
}

/// Instance data of [`DemoSaga`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "lmdb",
    derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize)
)]
pub struct DemoData {
    /// Copied from the start event
    pub emp_code: String,
    /// Copied from the start event
    pub activity_time_millis: u64,
}

/// Employee activity saga: keeps the employee code from its start event
/// and reports it in status responses.
pub struct DemoSaga;

impl SagaBehavior for DemoSaga {
    type Data = DemoData;
    type StartPayload = DemoStart;

    fn saga_type(&self) -> &str {
        "employee_activity"
    }

    fn on_start(
        &self,
        data: &mut DemoData,
        event: &StartSaga<DemoStart>,
    ) -> Result<(), ExtensionError> {
        if event.payload.emp_code.is_empty() {
            return Err(ExtensionError::new("emp_code is required"));
        }
        data.emp_code = event.payload.emp_code.clone();
        data.activity_time_millis = event.payload.activity_time_millis;
        Ok(())
    }

    fn on_status(
        &self,
        snapshot: &SagaInstance<DemoData>,
        response: StatusResponse,
    ) -> Result<StatusResponse, ExtensionError> {
        Ok(response
            .with_detail("emp_code", snapshot.data().emp_code.as_str())
            .with_detail(
                "activity_time_millis",
                snapshot.data().activity_time_millis.to_string(),
            ))
    }
}

/// Saga whose start action always fails
pub struct FailingSaga;

impl SagaBehavior for FailingSaga {
    type Data = ();
    type StartPayload = ();

    fn saga_type(&self) -> &str {
        "failing"
    }

    fn on_start(&self, _data: &mut (), _event: &StartSaga<()>) -> Result<(), ExtensionError> {
        Err(ExtensionError::new("start action failed"))
    }
}

/// Observer that records every callback as a short string
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    /// Recorded callbacks, oldest first
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl SagaObserver for RecordingObserver {
    fn on_saga_started(&self, _saga_type: &str, correlation_id: CorrelationId, state: SagaState) {
        self.record(format!("started:{correlation_id}:{state}"));
    }

    fn on_duplicate_start(&self, _saga_type: &str, correlation_id: CorrelationId) {
        self.record(format!("duplicate:{correlation_id}"));
    }

    fn on_start_failed(&self, _saga_type: &str, correlation_id: CorrelationId, _fault: &SagaFault) {
        self.record(format!("start_failed:{correlation_id}"));
    }

    fn on_status_answered(&self, _saga_type: &str, correlation_id: CorrelationId, state: SagaState) {
        self.record(format!("status:{correlation_id}:{state}"));
    }

    fn on_missing_instance(&self, _saga_type: &str, correlation_id: CorrelationId) {
        self.record(format!("missing:{correlation_id}"));
    }

    fn on_status_failed(&self, _saga_type: &str, correlation_id: CorrelationId, _fault: &SagaFault) {
        self.record(format!("status_failed:{correlation_id}"));
    }
}

/// Install a `tracing` subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}
