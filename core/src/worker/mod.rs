//! Background execution contexts, one per polling concern.
//!
//! Each worker is an isolated task owning one concern (version registry,
//! cycles monitoring, ledger transactions, custom-domain registration).
//! It shares no mutable state with the main context; everything crosses
//! the boundary as a [`WorkerMessage`]. A worker never lets an error
//! escape the boundary either — failures become `syncError` messages.

pub mod custom_domain;
pub mod cycles;
pub mod transactions;
pub mod version;

use std::time::Duration;

use async_trait::async_trait;
use deck_async_utils::OrCancel;
use deck_protocol::{Concern, EndpointId, WorkerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::SyncError;
use crate::remote::RemoteError;
use crate::scheduler::Scheduler;

pub use custom_domain::CustomDomainPoller;
pub use cycles::CyclesPoller;
pub use transactions::TransactionsPoller;
pub use version::VersionPoller;

/// One concern's polling behavior, driven by the generic worker loop.
#[async_trait]
pub trait ConcernPoller: Send + 'static {
    fn concern(&self) -> Concern;

    /// Called on the Idle → Polling transition, before the first tick.
    /// Used to hydrate cached state so the UI has instant data.
    async fn on_start(&mut self, _targets: &[EndpointId]) -> Vec<WorkerMessage> {
        Vec::new()
    }

    /// One polling round over `targets`. Must isolate per-target failures
    /// and always return one outcome message per polled target.
    async fn tick(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage>;

    /// Whether polling should continue after a round. Lets a worker retire
    /// itself once its targets reached a terminal state.
    fn keep_polling(&self, _targets: &[EndpointId]) -> bool {
        true
    }
}

/// Main-context handle to a spawned worker.
pub struct WorkerHandle {
    concern: Concern,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn concern(&self) -> Concern {
        self.concern
    }

    pub fn send(&self, message: WorkerMessage) -> Result<(), SyncError> {
        self.tx
            .send(message)
            .map_err(|_| SyncError::WorkerGone(self.concern))
    }

    pub fn start_polling(
        &self,
        targets: Vec<EndpointId>,
        interval: Duration,
    ) -> Result<(), SyncError> {
        self.send(WorkerMessage::StartPolling {
            targets,
            interval_ms: interval.as_millis().min(u64::MAX as u128) as u64,
        })
    }

    pub fn stop_polling(&self) -> Result<(), SyncError> {
        self.send(WorkerMessage::StopPolling)
    }

    /// Terminal teardown: cancel the timer and wait for the task to exit.
    /// No further messages are sent after this resolves.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.join.await {
            warn!(concern = self.concern.as_str(), "worker task panicked: {err}");
        }
    }
}

/// Spawn a worker task for `poller`. Returns the control handle and the
/// receiving end of the worker's outgoing messages.
pub fn spawn_worker<P: ConcernPoller>(
    poller: P,
) -> (WorkerHandle, mpsc::UnboundedReceiver<WorkerMessage>) {
    let concern = poller.concern();
    let (req_tx, req_rx) = mpsc::unbounded_channel();
    let (res_tx, res_rx) = mpsc::unbounded_channel();
    let token = CancellationToken::new();
    let join = tokio::spawn(run_worker(poller, req_rx, res_tx, token.clone()));
    (
        WorkerHandle {
            concern,
            tx: req_tx,
            token,
            join,
        },
        res_rx,
    )
}

enum Control {
    /// Schedule changed; re-evaluate immediately.
    Rearmed,
    /// Nothing to do; keep waiting.
    Unchanged,
}

async fn run_worker<P: ConcernPoller>(
    mut poller: P,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
    tx: mpsc::UnboundedSender<WorkerMessage>,
    token: CancellationToken,
) {
    let concern = poller.concern();
    let mut scheduler = Scheduler::new();

    'worker: loop {
        let Some(schedule) = scheduler.schedule().cloned() else {
            tokio::select! {
                _ = token.cancelled() => break 'worker,
                message = rx.recv() => match message {
                    None => break 'worker,
                    Some(message) => {
                        handle_control(message, &mut poller, &mut scheduler, &tx).await;
                    }
                },
            }
            continue;
        };

        // One round. Teardown may interrupt it; stopPolling may not — a
        // stop received mid-flight is handled after the round completes.
        let Ok(messages) = poller.tick(&schedule.targets).or_cancel(&token).await else {
            break 'worker;
        };
        for message in messages {
            if tx.send(message).is_err() {
                break 'worker;
            }
        }

        if !poller.keep_polling(&schedule.targets) {
            debug!(concern = concern.as_str(), "all targets settled; returning to idle");
            scheduler.stop();
            continue;
        }

        // Rearm relative to completion of this round, not to a wall-clock
        // grid; a slow backend therefore delays ticks instead of queueing
        // them. Control messages are still processed while waiting.
        let deadline = Instant::now() + schedule.interval;
        loop {
            tokio::select! {
                slept = tokio::time::sleep_until(deadline).or_cancel(&token) => {
                    match slept {
                        Ok(()) => break,
                        Err(_) => break 'worker,
                    }
                }
                message = rx.recv() => match message {
                    None => break 'worker,
                    Some(message) => {
                        if matches!(
                            handle_control(message, &mut poller, &mut scheduler, &tx).await,
                            Control::Rearmed
                        ) {
                            break;
                        }
                    }
                },
            }
        }
    }

    debug!(concern = concern.as_str(), "worker stopped");
}

async fn handle_control<P: ConcernPoller>(
    message: WorkerMessage,
    poller: &mut P,
    scheduler: &mut Scheduler,
    tx: &mpsc::UnboundedSender<WorkerMessage>,
) -> Control {
    match message {
        WorkerMessage::StartPolling {
            targets,
            interval_ms,
        } => {
            let was_idle = !scheduler.is_polling();
            scheduler.start(targets.clone(), Duration::from_millis(interval_ms));
            if was_idle {
                for message in poller.on_start(&targets).await {
                    let _ = tx.send(message);
                }
            }
            Control::Rearmed
        }
        WorkerMessage::StopPolling => {
            scheduler.stop();
            Control::Rearmed
        }
        other => {
            // Wrong-direction (or future) vocabulary: forward-compatible no-op.
            trace!(concern = poller.concern().as_str(), ?other, "ignoring message");
            Control::Unchanged
        }
    }
}

/// Turn per-target outcomes into outgoing messages: successes become
/// `syncResult`, failures become `syncError` without touching siblings.
fn outcome_messages(
    concern: Concern,
    outcomes: Vec<(
        EndpointId,
        Result<(Option<serde_json::Value>, bool), RemoteError>,
    )>,
) -> Vec<WorkerMessage> {
    outcomes
        .into_iter()
        .map(|(endpoint_id, outcome)| match outcome {
            Ok((data, certified)) => WorkerMessage::SyncResult {
                endpoint_id,
                data,
                certified,
            },
            Err(err) => {
                warn!(
                    concern = concern.as_str(),
                    endpoint = endpoint_id.as_str(),
                    "poll failed: {err}"
                );
                WorkerMessage::SyncError {
                    endpoint_id,
                    error: err.to_string(),
                }
            }
        })
        .collect()
}

/// Deserialize a response body into the concern's typed payload.
fn parse_body<T: serde::de::DeserializeOwned>(
    endpoint: &EndpointId,
    body: &serde_json::Value,
) -> Result<T, RemoteError> {
    serde_json::from_value(body.clone()).map_err(|err| RemoteError::Malformed {
        endpoint: endpoint.clone(),
        reason: err.to_string(),
    })
}
