//! Extension point implemented by concrete saga types

use crate::{ExtensionError, SagaInstance, StartSaga, StatusResponse};

/// Behavior of a concrete saga type.
///
/// The generic [`StateMachine`](crate::StateMachine) owns identity, state
/// and persistence; implementors only supply the data they keep and the
/// callbacks run inside transitions. Both callbacks are invoked
/// synchronously, and an error from either is reported to the caller as
/// [`SagaFault::ExtensionFailure`](crate::SagaFault::ExtensionFailure).
///
/// # Example
///
/// ```rust
/// use saga_correlation::{ExtensionError, SagaBehavior, StartSaga};
///
/// #[derive(Clone, Default)]
/// struct Onboarding { emp_code: String }
///
/// struct OnboardingSaga;
///
/// impl SagaBehavior for OnboardingSaga {
///     type Data = Onboarding;
///     type StartPayload = String;
///
///     fn saga_type(&self) -> &str { "onboarding" }
///
///     fn on_start(
///         &self,
///         data: &mut Onboarding,
///         event: &StartSaga<String>,
///     ) -> Result<(), ExtensionError> {
///         data.emp_code = event.payload.clone();
///         Ok(())
///     }
/// }
/// ```
pub trait SagaBehavior: Send + Sync + 'static {
    /// Data each instance carries
    type Data: Clone + Default + Send + Sync + 'static;

    /// Payload of the start event
    type StartPayload: Send + 'static;

    /// Name of this saga type, used in logs and responses
    fn saga_type(&self) -> &str;

    /// Initialize a new instance from its start event.
    ///
    /// Runs exactly once per correlation id, before the instance is stored.
    /// Returning an error discards the instance.
    fn on_start(
        &self,
        _data: &mut Self::Data,
        _event: &StartSaga<Self::StartPayload>,
    ) -> Result<(), ExtensionError> {
        Ok(())
    }

    /// Populate a status response.
    ///
    /// `response` arrives filled with id, state and timestamps. `snapshot`
    /// is a copy of the stored instance; nothing done to it is persisted.
    fn on_status(
        &self,
        _snapshot: &SagaInstance<Self::Data>,
        response: StatusResponse,
    ) -> Result<StatusResponse, ExtensionError> {
        Ok(response)
    }
}
