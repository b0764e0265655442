//! Cycles/balance monitoring.

use std::sync::Arc;

use async_trait::async_trait;
use deck_protocol::{Concern, CyclesSnapshot, EndpointId, WorkerMessage};
use tracing::warn;

use crate::cache::DurableCache;
use crate::config::PollConfig;
use crate::remote::{QueryRequest, RemoteQuery};
use crate::scheduler::poll_batch;
use crate::worker::{ConcernPoller, outcome_messages, parse_body};

pub struct CyclesPoller {
    remote: Arc<dyn RemoteQuery>,
    cache: DurableCache,
    config: PollConfig,
}

impl CyclesPoller {
    pub fn new(remote: Arc<dyn RemoteQuery>, cache: DurableCache, config: PollConfig) -> Self {
        Self {
            remote,
            cache,
            config,
        }
    }
}

#[async_trait]
impl ConcernPoller for CyclesPoller {
    fn concern(&self) -> Concern {
        Concern::Cycles
    }

    async fn on_start(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let cached = match self.cache.hydrate::<CyclesSnapshot>(Concern::Cycles).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!("cycles cache hydration failed: {err}");
                return Vec::new();
            }
        };

        targets
            .iter()
            .filter_map(|target| {
                let entry = cached.get(target)?;
                Some(WorkerMessage::SyncResult {
                    endpoint_id: target.clone(),
                    data: entry
                        .value
                        .as_ref()
                        .and_then(|snapshot| serde_json::to_value(snapshot).ok()),
                    certified: false,
                })
            })
            .collect()
    }

    async fn tick(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let remote = Arc::clone(&self.remote);
        let outcomes = poll_batch(targets, self.config.batch_limit, |target| {
            let remote = Arc::clone(&remote);
            async move {
                let response = remote.query(&target, QueryRequest::CyclesStatus).await?;
                let snapshot: CyclesSnapshot = parse_body(&target, &response.body)?;
                Ok((snapshot, response.certified))
            }
        })
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (endpoint, outcome) in outcomes {
            let outcome = match outcome {
                Ok((snapshot, certified)) => {
                    self.cache
                        .persist_best_effort(Concern::Cycles, &endpoint, Some(&snapshot))
                        .await;
                    Ok((serde_json::to_value(&snapshot).ok(), certified))
                }
                Err(err) => Err(err),
            };
            results.push((endpoint, outcome));
        }
        outcome_messages(Concern::Cycles, results)
    }
}
