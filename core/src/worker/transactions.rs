//! Ledger transaction polling.
//!
//! Keeps a per-endpoint high-water index so each round only requests
//! records the client has not seen yet. The latest page is mirrored to
//! the durable cache together with the index, so a restarted process
//! resumes from where it left off instead of re-reading the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deck_protocol::{Concern, EndpointId, TransactionRecord, WorkerMessage};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::DurableCache;
use crate::config::PollConfig;
use crate::remote::{QueryRequest, RemoteQuery};
use crate::scheduler::poll_batch;
use crate::worker::{ConcernPoller, outcome_messages, parse_body};

/// Cached ledger state per endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerPage {
    next_index: u64,
    records: Vec<TransactionRecord>,
}

pub struct TransactionsPoller {
    remote: Arc<dyn RemoteQuery>,
    cache: DurableCache,
    config: PollConfig,
    next_index: HashMap<EndpointId, u64>,
}

impl TransactionsPoller {
    pub fn new(remote: Arc<dyn RemoteQuery>, cache: DurableCache, config: PollConfig) -> Self {
        Self {
            remote,
            cache,
            config,
            next_index: HashMap::new(),
        }
    }
}

#[async_trait]
impl ConcernPoller for TransactionsPoller {
    fn concern(&self) -> Concern {
        Concern::Transactions
    }

    async fn on_start(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let cached = match self.cache.hydrate::<LedgerPage>(Concern::Transactions).await {
            Ok(cached) => cached,
            Err(err) => {
                warn!("transactions cache hydration failed: {err}");
                return Vec::new();
            }
        };

        targets
            .iter()
            .filter_map(|target| {
                let page = cached.get(target)?.value.as_ref()?;
                self.next_index.insert(target.clone(), page.next_index);
                Some(WorkerMessage::SyncResult {
                    endpoint_id: target.clone(),
                    data: serde_json::to_value(&page.records).ok(),
                    certified: false,
                })
            })
            .collect()
    }

    async fn tick(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let remote = Arc::clone(&self.remote);
        let next_index = self.next_index.clone();
        let outcomes = poll_batch(targets, self.config.batch_limit, |target| {
            let remote = Arc::clone(&remote);
            let start_index = next_index.get(&target).copied().unwrap_or(0);
            async move {
                let response = remote
                    .query(&target, QueryRequest::Transactions { start_index })
                    .await?;
                let records: Vec<TransactionRecord> = parse_body(&target, &response.body)?;
                Ok((records, response.certified))
            }
        })
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (endpoint, outcome) in outcomes {
            let outcome = match outcome {
                Ok((records, certified)) => {
                    if let Some(newest) = records.iter().map(|record| record.index).max() {
                        let next = newest + 1;
                        self.next_index.insert(endpoint.clone(), next);
                        self.cache
                            .persist_best_effort(
                                Concern::Transactions,
                                &endpoint,
                                Some(&LedgerPage {
                                    next_index: next,
                                    records: records.clone(),
                                }),
                            )
                            .await;
                    }
                    Ok((serde_json::to_value(&records).ok(), certified))
                }
                Err(err) => Err(err),
            };
            results.push((endpoint, outcome));
        }
        outcome_messages(Concern::Transactions, results)
    }
}
