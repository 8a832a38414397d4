//! In-process delivery: fire-and-forget starts and request/response status queries

use crate::{
    CorrelationId, SagaBehavior, SagaFault, StartSaga, StateMachine, StatusRequested,
    StatusResponse,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

/// Bus settings
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Messages buffered before `publish`/`request_status` wait for room
    pub inbox_capacity: usize,
    /// How long `request_status` waits for an answer
    pub request_timeout: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1024,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Failure seen by a bus caller
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The receive loop has stopped
    #[error("saga bus is closed")]
    Closed,
    /// No answer within the request timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The machine answered with a fault
    #[error(transparent)]
    Fault(#[from] SagaFault),
}

enum Envelope<P> {
    Publish(StartSaga<P>),
    Request {
        query: StatusRequested,
        reply: oneshot::Sender<Result<StatusResponse, SagaFault>>,
    },
}

/// Delivers events to a [`StateMachine`] from async code.
///
/// A single receive loop drains the inbox and hands each message to the
/// blocking pool, so a start waiting on its key lock never stalls delivery
/// for other ids.
pub struct SagaBus<B: SagaBehavior> {
    inbox: mpsc::Sender<Envelope<B::StartPayload>>,
    machine: Arc<StateMachine<B>>,
    config: BusConfig,
    receiver: JoinHandle<()>,
}

impl<B: SagaBehavior> SagaBus<B> {
    /// Start the receive loop. Must be called inside a tokio runtime.
    pub fn spawn(machine: Arc<StateMachine<B>>, config: BusConfig) -> Self {
        let (inbox, rx) = mpsc::channel(config.inbox_capacity.max(1));
        let receiver = tokio::spawn(receive_loop(machine.clone(), rx));
        tracing::info!(
            saga_type = %machine.behavior().saga_type(),
            inbox_capacity = config.inbox_capacity,
            "Saga bus started"
        );
        Self {
            inbox,
            machine,
            config,
            receiver,
        }
    }

    /// Machine behind this bus
    pub fn machine(&self) -> &Arc<StateMachine<B>> {
        &self.machine
    }

    /// Queue a start event. The outcome is reported through the machine's
    /// observer and stats, not to the publisher.
    pub async fn publish(&self, event: StartSaga<B::StartPayload>) -> Result<(), BusError> {
        self.inbox
            .send(Envelope::Publish(event))
            .await
            .map_err(|_| BusError::Closed)
    }

    /// Ask for the current state of `correlation_id` and wait for the answer
    pub async fn request_status(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<StatusResponse, BusError> {
        let (reply, answer) = oneshot::channel();
        self.inbox
            .send(Envelope::Request {
                query: StatusRequested::new(correlation_id),
                reply,
            })
            .await
            .map_err(|_| BusError::Closed)?;

        match tokio::time::timeout(self.config.request_timeout, answer).await {
            Err(_) => Err(BusError::Timeout(self.config.request_timeout)),
            Ok(Err(_)) => Err(BusError::Closed),
            Ok(Ok(result)) => result.map_err(BusError::Fault),
        }
    }

    /// Stop accepting messages and wait for in-flight ones to finish
    pub async fn shutdown(self) {
        let Self {
            inbox,
            machine,
            receiver,
            ..
        } = self;
        drop(inbox);
        if let Err(e) = receiver.await {
            tracing::error!(error = %e, "Saga bus receive loop failed");
        }
        tracing::info!(saga_type = %machine.behavior().saga_type(), "Saga bus stopped");
    }
}

async fn receive_loop<B: SagaBehavior>(
    machine: Arc<StateMachine<B>>,
    mut rx: mpsc::Receiver<Envelope<B::StartPayload>>,
) {
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(envelope) => {
                    let machine = machine.clone();
                    in_flight.spawn_blocking(move || deliver(&machine, envelope));
                }
                None => break,
            },
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = done {
                    tracing::error!(error = %e, "Saga delivery task failed");
                }
            }
        }
    }
    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            tracing::error!(error = %e, "Saga delivery task failed");
        }
    }
}

fn deliver<B: SagaBehavior>(machine: &StateMachine<B>, envelope: Envelope<B::StartPayload>) {
    match envelope {
        Envelope::Publish(event) => {
            let correlation_id = event.correlation_id;
            if let Err(fault) = machine.start(event) {
                tracing::debug!(%correlation_id, error = %fault, "Published start rejected");
            }
        }
        Envelope::Request { query, reply } => {
            let answer = machine.status(&query);
            if reply.send(answer).is_err() {
                tracing::debug!(correlation_id = %query.correlation_id, "Status requester went away");
            }
        }
    }
}
