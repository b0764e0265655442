//! Main-context façade over the sync machinery.
//!
//! Spawns the four concern workers, pumps their outgoing messages into
//! the stores (through the certified/uncertified merge rule), and offers
//! the check-store-first load path the UI services call into. This is the
//! only layer where user-visible error presentation happens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use deck_protocol::{Concern, EndpointId, VersionMetadata, WorkerMessage};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::DurableCache;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::remote::{QueryRequest, RemoteError, RemoteQuery};
use crate::store::EntryState;
use crate::store::registry::StoreRegistry;
use crate::worker::{
    CustomDomainPoller, CyclesPoller, TransactionsPoller, VersionPoller, WorkerHandle,
    spawn_worker,
};

/// User-visible error surface (toast/notification), implemented by the
/// embedding application.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

pub struct SyncService {
    config: SyncConfig,
    registry: Arc<StoreRegistry>,
    remote: Arc<dyn RemoteQuery>,
    notifier: Arc<dyn Notifier>,
    workers: HashMap<Concern, WorkerHandle>,
    pumps: Vec<JoinHandle<()>>,
}

impl SyncService {
    /// Construct the registry, spawn one worker per concern, and start the
    /// response pumps.
    pub fn spawn(
        config: SyncConfig,
        remote: Arc<dyn RemoteQuery>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SyncError> {
        let cache = match &config.data_dir {
            Some(dir) => DurableCache::with_base_dir(dir.clone())?,
            None => DurableCache::new()?,
        };
        let registry = Arc::new(StoreRegistry::new(cache.clone()));

        let mut workers = HashMap::new();
        let mut pumps = Vec::new();
        let mut register = |concern: Concern,
                            handle: WorkerHandle,
                            rx: mpsc::UnboundedReceiver<WorkerMessage>| {
            workers.insert(concern, handle);
            pumps.push(spawn_pump(
                concern,
                rx,
                Arc::clone(&registry),
                Arc::clone(&notifier),
            ));
        };

        let (handle, rx) = spawn_worker(VersionPoller::new(
            Arc::clone(&remote),
            cache.clone(),
            config.version.clone(),
        ));
        register(Concern::Version, handle, rx);

        let (handle, rx) = spawn_worker(CyclesPoller::new(
            Arc::clone(&remote),
            cache.clone(),
            config.cycles.clone(),
        ));
        register(Concern::Cycles, handle, rx);

        let (handle, rx) = spawn_worker(TransactionsPoller::new(
            Arc::clone(&remote),
            cache.clone(),
            config.transactions.clone(),
        ));
        register(Concern::Transactions, handle, rx);

        let (handle, rx) = spawn_worker(CustomDomainPoller::new(
            Arc::clone(&remote),
            config.custom_domain.clone(),
        ));
        register(Concern::CustomDomain, handle, rx);

        Ok(Self {
            config,
            registry,
            remote,
            notifier,
            workers,
            pumps,
        })
    }

    pub fn registry(&self) -> &Arc<StoreRegistry> {
        &self.registry
    }

    /// Start (or rearm) polling for a concern with its configured interval.
    pub fn start_polling(
        &self,
        concern: Concern,
        targets: Vec<EndpointId>,
    ) -> Result<(), SyncError> {
        self.start_polling_every(concern, targets, self.config.poll(concern).interval())
    }

    /// Start (or rearm) polling for a concern with an explicit interval.
    pub fn start_polling_every(
        &self,
        concern: Concern,
        targets: Vec<EndpointId>,
        interval: Duration,
    ) -> Result<(), SyncError> {
        self.worker(concern)?.start_polling(targets, interval)
    }

    pub fn stop_polling(&self, concern: Concern) -> Result<(), SyncError> {
        self.worker(concern)?.stop_polling()
    }

    /// Check-store-first load of an endpoint's version metadata: if the
    /// store already has a loaded entry this is a no-op, otherwise one
    /// remote query runs and its result is merged in and mirrored to the
    /// cache.
    pub async fn ensure_version_loaded(&self, endpoint: &EndpointId) -> Result<(), SyncError> {
        if let EntryState::Loaded(entry) = self.registry.versions().get(endpoint)
            && entry.is_loaded()
        {
            return Ok(());
        }
        self.reload_version(endpoint).await
    }

    /// Unconditional fetch of an endpoint's version metadata.
    ///
    /// A failed load is surfaced once through the notifier and marks the
    /// entry tried-and-empty, same as the worker error path.
    pub async fn reload_version(&self, endpoint: &EndpointId) -> Result<(), SyncError> {
        let response = match self.remote.query(endpoint, QueryRequest::ModuleVersion).await {
            Ok(response) => response,
            Err(err) => return Err(self.fail_version_load(endpoint, err)),
        };
        let metadata: VersionMetadata = match serde_json::from_value(response.body) {
            Ok(metadata) => metadata,
            Err(err) => {
                let err = RemoteError::Malformed {
                    endpoint: endpoint.clone(),
                    reason: err.to_string(),
                };
                return Err(self.fail_version_load(endpoint, err));
            }
        };
        self.registry
            .cache()
            .persist_best_effort(Concern::Version, endpoint, Some(&metadata))
            .await;
        self.registry
            .versions()
            .apply(endpoint, metadata, response.certified);
        Ok(())
    }

    fn fail_version_load(&self, endpoint: &EndpointId, err: RemoteError) -> SyncError {
        self.notifier
            .error(&format!("version sync failed for {endpoint}: {err}"));
        self.registry.versions().reset(endpoint);
        err.into()
    }

    /// Endpoint detachment: stores go tried-and-empty, cache entries go away.
    pub async fn detach_endpoint(&self, endpoint: &EndpointId) {
        self.registry.reset_endpoint(endpoint).await;
    }

    /// Sign-out teardown: stop and join every worker, then clear all state.
    pub async fn sign_out(self) {
        for (_, handle) in self.workers {
            handle.shutdown().await;
        }
        for pump in self.pumps {
            if let Err(err) = pump.await {
                warn!("response pump panicked: {err}");
            }
        }
        self.registry.reset_all().await;
    }

    fn worker(&self, concern: Concern) -> Result<&WorkerHandle, SyncError> {
        self.workers
            .get(&concern)
            .ok_or(SyncError::WorkerGone(concern))
    }
}

fn spawn_pump(
    concern: Concern,
    mut rx: mpsc::UnboundedReceiver<WorkerMessage>,
    registry: Arc<StoreRegistry>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            apply_message(concern, message, &registry, notifier.as_ref());
        }
        debug!(concern = concern.as_str(), "response pump stopped");
    })
}

/// Merge one worker message into the stores.
///
/// Results go through the certified/uncertified merge rule; a rejected
/// downgrade is an expected race and not surfaced anywhere. Errors reset
/// the entry to tried-and-empty and are surfaced once through the
/// notifier.
pub fn apply_message(
    concern: Concern,
    message: WorkerMessage,
    registry: &StoreRegistry,
    notifier: &dyn Notifier,
) {
    match message {
        WorkerMessage::SyncResult {
            endpoint_id,
            data,
            certified,
        } => match data {
            Some(data) => apply_result(concern, &endpoint_id, data, certified, registry),
            None => reset_entry(concern, &endpoint_id, registry),
        },
        WorkerMessage::SyncError { endpoint_id, error } => {
            notifier.error(&format!("{concern} sync failed for {endpoint_id}: {error}"));
            reset_entry(concern, &endpoint_id, registry);
        }
        // Requests travelling main → worker; nothing to apply here.
        WorkerMessage::StartPolling { .. } | WorkerMessage::StopPolling => {}
    }
}

fn apply_result(
    concern: Concern,
    endpoint: &EndpointId,
    data: serde_json::Value,
    certified: bool,
    registry: &StoreRegistry,
) {
    let applied = match concern {
        Concern::Version => match serde_json::from_value(data) {
            Ok(metadata) => Some(registry.versions().apply(endpoint, metadata, certified)),
            Err(err) => {
                warn!(endpoint = endpoint.as_str(), "bad version payload: {err}");
                None
            }
        },
        Concern::Cycles => match serde_json::from_value(data) {
            Ok(snapshot) => Some(registry.cycles().apply(endpoint, snapshot, certified)),
            Err(err) => {
                warn!(endpoint = endpoint.as_str(), "bad cycles payload: {err}");
                None
            }
        },
        Concern::Transactions => match serde_json::from_value(data) {
            Ok(records) => Some(merge_transactions(endpoint, records, certified, registry)),
            Err(err) => {
                warn!(endpoint = endpoint.as_str(), "bad transactions payload: {err}");
                None
            }
        },
        Concern::CustomDomain => match serde_json::from_value(data) {
            Ok(state) => Some(registry.custom_domains().apply(endpoint, state, certified)),
            Err(err) => {
                warn!(endpoint = endpoint.as_str(), "bad domain payload: {err}");
                None
            }
        },
    };
    if applied == Some(false) {
        debug!(
            concern = concern.as_str(),
            endpoint = endpoint.as_str(),
            "uncertified result arrived after certified value; dropped"
        );
    }
}

/// Transactions accumulate: new records extend the loaded list, deduped
/// by ledger index and kept in index order.
fn merge_transactions(
    endpoint: &EndpointId,
    records: Vec<deck_protocol::TransactionRecord>,
    certified: bool,
    registry: &StoreRegistry,
) -> bool {
    let mut merged = match registry.transactions().get(endpoint) {
        EntryState::Loaded(entry) => entry.into_data().unwrap_or_default(),
        _ => Vec::new(),
    };
    for record in records {
        if !merged.iter().any(|existing| existing.index == record.index) {
            merged.push(record);
        }
    }
    merged.sort_by_key(|record| record.index);
    registry.transactions().apply(endpoint, merged, certified)
}

fn reset_entry(concern: Concern, endpoint: &EndpointId, registry: &StoreRegistry) {
    match concern {
        Concern::Version => registry.versions().reset(endpoint),
        Concern::Cycles => registry.cycles().reset(endpoint),
        Concern::Transactions => registry.transactions().reset(endpoint),
        Concern::CustomDomain => registry.custom_domains().reset(endpoint),
    }
}
