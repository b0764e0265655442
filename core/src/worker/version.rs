//! Version registry polling.
//!
//! Fetches each target's deployed/released versions, mirrors them into
//! the durable cache, and replays cached metadata the moment polling
//! starts so the feature gate has data before the first network
//! round-trip completes.

use std::sync::Arc;

use async_trait::async_trait;
use deck_protocol::{Concern, EndpointId, VersionMetadata, WorkerMessage};
use tracing::{debug, warn};

use crate::cache::DurableCache;
use crate::config::PollConfig;
use crate::remote::{QueryRequest, RemoteQuery};
use crate::scheduler::poll_batch;
use crate::worker::{ConcernPoller, outcome_messages, parse_body};

pub struct VersionPoller {
    remote: Arc<dyn RemoteQuery>,
    cache: DurableCache,
    config: PollConfig,
}

impl VersionPoller {
    pub fn new(remote: Arc<dyn RemoteQuery>, cache: DurableCache, config: PollConfig) -> Self {
        Self {
            remote,
            cache,
            config,
        }
    }
}

#[async_trait]
impl ConcernPoller for VersionPoller {
    fn concern(&self) -> Concern {
        Concern::Version
    }

    async fn on_start(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let cached = match self.cache.hydrate::<VersionMetadata>(Concern::Version).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!("version cache hydration failed: {err}");
                return Vec::new();
            }
        };

        // Persisted data cannot carry a live certification proof, so
        // everything replayed from disk is uncertified. Stale entries are
        // replayed too; the immediate first tick re-validates them.
        targets
            .iter()
            .filter_map(|target| {
                let entry = cached.get(target)?;
                if !entry.is_fresh(self.config.freshness()) {
                    debug!(endpoint = target.as_str(), "cached version is stale");
                }
                Some(WorkerMessage::SyncResult {
                    endpoint_id: target.clone(),
                    data: entry
                        .value
                        .as_ref()
                        .and_then(|meta| serde_json::to_value(meta).ok()),
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
                let response = remote.query(&target, QueryRequest::ModuleVersion).await?;
                let metadata: VersionMetadata = parse_body(&target, &response.body)?;
                Ok((metadata, response.certified))
            }
        })
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (endpoint, outcome) in outcomes {
            let outcome = match outcome {
                Ok((metadata, certified)) => {
                    if metadata.upgrade_available() {
                        debug!(
                            endpoint = endpoint.as_str(),
                            current = %metadata.current,
                            release = %metadata.release,
                            "module upgrade available"
                        );
                    }
                    self.cache
                        .persist_best_effort(Concern::Version, &endpoint, Some(&metadata))
                        .await;
                    Ok((serde_json::to_value(&metadata).ok(), certified))
                }
                Err(err) => Err(err),
            };
            results.push((endpoint, outcome));
        }
        outcome_messages(Concern::Version, results)
    }
}
