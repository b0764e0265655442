//! Explicit registry of the per-concern stores.
//!
//! Constructed once at process start and passed by reference to
//! consumers; there are no module-scope singletons. `reset_all` is the
//! documented sign-out teardown and keeps the durable cache in lockstep
//! with the in-memory stores.

use deck_protocol::{
    Concern, CustomDomainState, CyclesSnapshot, EndpointId, TransactionRecord, VersionMetadata,
};
use tracing::warn;

use crate::cache::DurableCache;
use crate::store::endpoint_map::CertifiedStore;

pub struct StoreRegistry {
    versions: CertifiedStore<VersionMetadata>,
    cycles: CertifiedStore<CyclesSnapshot>,
    transactions: CertifiedStore<Vec<TransactionRecord>>,
    custom_domains: CertifiedStore<CustomDomainState>,
    cache: DurableCache,
}

impl StoreRegistry {
    pub fn new(cache: DurableCache) -> Self {
        Self {
            versions: CertifiedStore::new(),
            cycles: CertifiedStore::new(),
            transactions: CertifiedStore::new(),
            custom_domains: CertifiedStore::new(),
            cache,
        }
    }

    pub fn versions(&self) -> &CertifiedStore<VersionMetadata> {
        &self.versions
    }

    pub fn cycles(&self) -> &CertifiedStore<CyclesSnapshot> {
        &self.cycles
    }

    pub fn transactions(&self) -> &CertifiedStore<Vec<TransactionRecord>> {
        &self.transactions
    }

    pub fn custom_domains(&self) -> &CertifiedStore<CustomDomainState> {
        &self.custom_domains
    }

    pub fn cache(&self) -> &DurableCache {
        &self.cache
    }

    /// Sign-out teardown: clear every store and evict the whole cache.
    pub async fn reset_all(&self) {
        self.versions.reset_all();
        self.cycles.reset_all();
        self.transactions.reset_all();
        self.custom_domains.reset_all();
        if let Err(err) = self.cache.evict_all().await {
            warn!("cache eviction on reset failed: {err}");
        }
    }

    /// Endpoint detachment: mark every store entry tried-and-empty and
    /// delete the endpoint's cache entries.
    pub async fn reset_endpoint(&self, endpoint: &EndpointId) {
        self.versions.reset(endpoint);
        self.cycles.reset(endpoint);
        self.transactions.reset(endpoint);
        self.custom_domains.reset(endpoint);
        for concern in Concern::ALL {
            if let Err(err) = self.cache.evict(concern, endpoint).await {
                warn!(
                    concern = concern.as_str(),
                    endpoint = endpoint.as_str(),
                    "cache eviction on detach failed: {err}"
                );
            }
        }
    }
}
