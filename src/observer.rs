//! Saga observer trait

use super::{CorrelationId, SagaFault, SagaState};

/// Observer trait for external observability
pub trait SagaObserver: Send + Sync + 'static {
    /// A start event created an instance
    fn on_saga_started(&self, saga_type: &str, correlation_id: CorrelationId, state: SagaState);
    /// A start event hit an existing instance
    fn on_duplicate_start(&self, saga_type: &str, correlation_id: CorrelationId);
    /// A start event failed without creating anything
    fn on_start_failed(&self, saga_type: &str, correlation_id: CorrelationId, fault: &SagaFault);
    /// A status query was answered
    fn on_status_answered(&self, saga_type: &str, correlation_id: CorrelationId, state: SagaState);
    /// A status query found no instance
    fn on_missing_instance(&self, saga_type: &str, correlation_id: CorrelationId);
    /// A status query failed for another reason
    fn on_status_failed(&self, saga_type: &str, correlation_id: CorrelationId, fault: &SagaFault);
}

/// No-op observer
pub struct NoOpObserver;

impl SagaObserver for NoOpObserver {
    fn on_saga_started(&self, _saga_type: &str, _correlation_id: CorrelationId, _state: SagaState) {}
    fn on_duplicate_start(&self, _saga_type: &str, _correlation_id: CorrelationId) {}
    fn on_start_failed(&self, _saga_type: &str, _correlation_id: CorrelationId, _fault: &SagaFault) {}
    fn on_status_answered(&self, _saga_type: &str, _correlation_id: CorrelationId, _state: SagaState) {}
    fn on_missing_instance(&self, _saga_type: &str, _correlation_id: CorrelationId) {}
    fn on_status_failed(&self, _saga_type: &str, _correlation_id: CorrelationId, _fault: &SagaFault) {}
}

/// Tracing-based observer
pub struct TracingObserver;

impl SagaObserver for TracingObserver {
    fn on_saga_started(&self, saga_type: &str, correlation_id: CorrelationId, state: SagaState) {
        tracing::info!(%correlation_id, saga_type = %saga_type, state = %state, "Saga started");
    }

    fn on_duplicate_start(&self, saga_type: &str, correlation_id: CorrelationId) {
        tracing::warn!(%correlation_id, saga_type = %saga_type, "Duplicate start rejected");
    }

    fn on_start_failed(&self, saga_type: &str, correlation_id: CorrelationId, fault: &SagaFault) {
        tracing::warn!(%correlation_id, saga_type = %saga_type, error = %fault, "Saga start failed");
    }

    fn on_status_answered(&self, saga_type: &str, correlation_id: CorrelationId, state: SagaState) {
        tracing::debug!(%correlation_id, saga_type = %saga_type, state = %state, "Status answered");
    }

    fn on_missing_instance(&self, saga_type: &str, correlation_id: CorrelationId) {
        tracing::warn!(%correlation_id, saga_type = %saga_type, "Status requested for missing instance");
    }

    fn on_status_failed(&self, saga_type: &str, correlation_id: CorrelationId, fault: &SagaFault) {
        tracing::warn!(%correlation_id, saga_type = %saga_type, error = %fault, "Status query failed");
    }
}
