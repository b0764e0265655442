//! Polling scheduler: per-worker repeating-timer state and batched rounds.
//!
//! Ticks are strictly sequential within one worker: tick *n+1* is armed
//! from the completion of tick *n*, never from a fixed wall-clock grid, so
//! a slow backend delays the schedule instead of growing a backlog.

use std::future::Future;
use std::time::Duration;

use deck_protocol::EndpointId;
use futures::StreamExt;
use futures::stream::FuturesOrdered;

use crate::remote::RemoteError;

/// Concurrent remote calls per polling round unless configured otherwise.
pub const DEFAULT_BATCH_LIMIT: usize = 12;

/// Parameters of an active polling schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSchedule {
    pub targets: Vec<EndpointId>,
    pub interval: Duration,
}

/// Idle/Polling state machine driven by `startPolling`/`stopPolling`.
#[derive(Debug, Default)]
pub struct Scheduler {
    schedule: Option<PollSchedule>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter (or rearm) the Polling state. Starting while already polling
    /// replaces the schedule; there is never more than one timer.
    pub fn start(&mut self, targets: Vec<EndpointId>, interval: Duration) {
        self.schedule = Some(PollSchedule { targets, interval });
    }

    /// Return to Idle. Idempotent; stopping twice is a no-op.
    pub fn stop(&mut self) {
        self.schedule = None;
    }

    pub fn is_polling(&self) -> bool {
        self.schedule.is_some()
    }

    pub fn schedule(&self) -> Option<&PollSchedule> {
        self.schedule.as_ref()
    }
}

/// Issue one batched round over `targets`, at most `limit` in flight.
///
/// Failures are isolated per item: one failing target never aborts its
/// siblings, and the round always completes with an outcome per target, in
/// target order.
pub async fn poll_batch<R, F, Fut>(
    targets: &[EndpointId],
    limit: usize,
    poll_one: F,
) -> Vec<(EndpointId, Result<R, RemoteError>)>
where
    F: Fn(EndpointId) -> Fut,
    Fut: Future<Output = Result<R, RemoteError>>,
{
    let mut outcomes = Vec::with_capacity(targets.len());
    for chunk in targets.chunks(limit.max(1)) {
        let round: FuturesOrdered<_> = chunk
            .iter()
            .map(|target| {
                let target = target.clone();
                let fut = poll_one(target.clone());
                async move { (target, fut.await) }
            })
            .collect();
        outcomes.extend(round.collect::<Vec<_>>().await);
    }
    outcomes
}
