//! Shared test doubles for the integration suites.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use deck_core::service::Notifier;
use deck_core::{QueryRequest, QueryResponse, RemoteError, RemoteQuery};
use deck_protocol::EndpointId;

/// Scripted remote endpoint: every query for an endpoint returns the
/// configured response (or error) and bumps a per-endpoint counter.
pub struct MockRemote {
    responses: Mutex<HashMap<EndpointId, Result<QueryResponse, RemoteError>>>,
    queries: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(HashMap::new()),
            queries: AtomicUsize::new(0),
        })
    }

    pub fn respond(&self, endpoint: &EndpointId, response: Result<QueryResponse, RemoteError>) {
        self.responses
            .lock()
            .expect("lock")
            .insert(endpoint.clone(), response);
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteQuery for MockRemote {
    async fn query(
        &self,
        endpoint: &EndpointId,
        _request: QueryRequest,
    ) -> Result<QueryResponse, RemoteError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .expect("lock")
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| {
                Err(RemoteError::Unreachable {
                    endpoint: endpoint.clone(),
                    reason: "no scripted response".to_string(),
                })
            })
    }
}

/// Notifier capturing every surfaced error message.
pub struct RecordingNotifier(Mutex<Vec<String>>);

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self(Mutex::new(Vec::new())))
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().expect("lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.0.lock().expect("lock").push(message.to_string());
    }
}

/// Poll a condition under the (paused) test clock until it holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}
