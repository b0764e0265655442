//! Custom-domain registration watch.
//!
//! Unlike the other concerns this one is self-limiting: once every
//! watched endpoint's registration reaches a terminal state there is
//! nothing left to observe and the worker retires to idle on its own.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use deck_protocol::{Concern, CustomDomainState, EndpointId, RegistrationState, WorkerMessage};

use crate::config::PollConfig;
use crate::remote::{QueryRequest, RemoteQuery};
use crate::scheduler::poll_batch;
use crate::worker::{ConcernPoller, outcome_messages, parse_body};

pub struct CustomDomainPoller {
    remote: Arc<dyn RemoteQuery>,
    config: PollConfig,
    last_seen: HashMap<EndpointId, RegistrationState>,
}

impl CustomDomainPoller {
    pub fn new(remote: Arc<dyn RemoteQuery>, config: PollConfig) -> Self {
        Self {
            remote,
            config,
            last_seen: HashMap::new(),
        }
    }
}

#[async_trait]
impl ConcernPoller for CustomDomainPoller {
    fn concern(&self) -> Concern {
        Concern::CustomDomain
    }

    async fn tick(&mut self, targets: &[EndpointId]) -> Vec<WorkerMessage> {
        let remote = Arc::clone(&self.remote);
        let outcomes = poll_batch(targets, self.config.batch_limit, |target| {
            let remote = Arc::clone(&remote);
            async move {
                let response = remote.query(&target, QueryRequest::DomainStatus).await?;
                let state: CustomDomainState = parse_body(&target, &response.body)?;
                Ok((state, response.certified))
            }
        })
        .await;

        let mut results = Vec::with_capacity(outcomes.len());
        for (endpoint, outcome) in outcomes {
            let outcome = match outcome {
                Ok((state, certified)) => {
                    self.last_seen.insert(endpoint.clone(), state.state);
                    Ok((serde_json::to_value(&state).ok(), certified))
                }
                Err(err) => Err(err),
            };
            results.push((endpoint, outcome));
        }
        outcome_messages(Concern::CustomDomain, results)
    }

    fn keep_polling(&self, targets: &[EndpointId]) -> bool {
        !targets.iter().all(|target| {
            self.last_seen
                .get(target)
                .is_some_and(|state| state.is_terminal())
        })
    }
}
