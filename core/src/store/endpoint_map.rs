//! Keyed per-endpoint containers.

use std::collections::HashMap;

use deck_protocol::EndpointId;

use crate::store::certified::Certified;
use crate::store::observable::{Observable, Subscription};

/// Whole-map state of an [`EndpointStore`].
///
/// `Uninit` means the store was never touched; `Cleared` means a
/// `reset_all` wiped it (tried, empty); `Ready` holds the per-endpoint
/// entries. Collapsing `Uninit` and `Cleared` would lose the signal the UI
/// uses to tell "loading" apart from "empty".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapState<T> {
    Uninit,
    Cleared,
    Ready(HashMap<EndpointId, Option<T>>),
}

impl<T> MapState<T> {
    fn entries_mut(&mut self) -> &mut HashMap<EndpointId, Option<T>> {
        if !matches!(self, MapState::Ready(_)) {
            *self = MapState::Ready(HashMap::new());
        }
        match self {
            MapState::Ready(entries) => entries,
            _ => unreachable!("just initialized"),
        }
    }
}

/// State of a single endpoint's entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState<T> {
    /// Never attempted for this endpoint.
    Unknown,
    /// Attempted and confirmed absent (or failed); no immediate retry.
    Empty,
    Loaded(T),
}

impl<T> EntryState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            EntryState::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// Observable map of endpoint id → value, preserving the three-way
/// never-attempted / tried-and-empty / loaded distinction per key.
///
/// Infallible by design: callers decide what value represents failure.
#[derive(Debug, Clone)]
pub struct EndpointStore<T: Clone> {
    state: Observable<MapState<T>>,
}

impl<T: Clone> EndpointStore<T> {
    pub fn new() -> Self {
        Self {
            state: Observable::new(MapState::Uninit),
        }
    }

    /// Merge a value in at `endpoint`, leaving other keys untouched.
    pub fn set(&self, endpoint: &EndpointId, value: T) {
        self.state.update(|state| {
            state.entries_mut().insert(endpoint.clone(), Some(value));
        });
    }

    /// Mark `endpoint` as tried-and-empty. Distinct from deletion.
    pub fn reset(&self, endpoint: &EndpointId) {
        self.state.update(|state| {
            state.entries_mut().insert(endpoint.clone(), None);
        });
    }

    /// Drop the key entirely, returning it to the never-attempted state.
    pub fn remove(&self, endpoint: &EndpointId) {
        self.state.update(|state| {
            if let MapState::Ready(entries) = state {
                entries.remove(endpoint);
            }
        });
    }

    /// Replace the whole map with the cleared state.
    pub fn reset_all(&self) {
        self.state.set(MapState::Cleared);
    }

    pub fn get(&self, endpoint: &EndpointId) -> EntryState<T> {
        match self.state.get() {
            MapState::Uninit | MapState::Cleared => EntryState::Unknown,
            MapState::Ready(mut entries) => match entries.remove(endpoint) {
                None => EntryState::Unknown,
                Some(None) => EntryState::Empty,
                Some(Some(value)) => EntryState::Loaded(value),
            },
        }
    }

    pub fn snapshot(&self) -> MapState<T> {
        self.state.get()
    }

    #[must_use = "dropping the subscription unsubscribes"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&MapState<T>) + Send + Sync + 'static,
    ) -> Subscription
    where
        T: Send + 'static,
    {
        self.state.subscribe(callback)
    }

    pub(crate) fn observable(&self) -> &Observable<MapState<T>> {
        &self.state
    }
}

impl<T: Clone> Default for EndpointStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`EndpointStore`] whose entries carry a certification flag and whose
/// writes go through the certified/uncertified merge rule.
#[derive(Debug, Clone)]
pub struct CertifiedStore<T: Clone> {
    inner: EndpointStore<Certified<T>>,
}

impl<T: Clone> CertifiedStore<T> {
    pub fn new() -> Self {
        Self {
            inner: EndpointStore::new(),
        }
    }

    /// Merge an incoming `(data, certified)` pair into the entry for
    /// `endpoint`. Returns whether the write was applied; a rejected
    /// certification downgrade leaves the entry untouched.
    pub fn apply(&self, endpoint: &EndpointId, data: T, certified: bool) -> bool {
        let incoming = Certified::loaded(data, certified);
        self.inner.observable().update(|state| {
            let entries = state.entries_mut();
            match entries.get_mut(endpoint) {
                Some(Some(current)) => current.merge(incoming),
                _ => {
                    entries.insert(endpoint.clone(), Some(incoming));
                    true
                }
            }
        })
    }

    pub fn get(&self, endpoint: &EndpointId) -> EntryState<Certified<T>> {
        self.inner.get(endpoint)
    }

    pub fn reset(&self, endpoint: &EndpointId) {
        self.inner.reset(endpoint);
    }

    pub fn remove(&self, endpoint: &EndpointId) {
        self.inner.remove(endpoint);
    }

    pub fn reset_all(&self) {
        self.inner.reset_all();
    }

    pub fn snapshot(&self) -> MapState<Certified<T>> {
        self.inner.snapshot()
    }

    #[must_use = "dropping the subscription unsubscribes"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&MapState<Certified<T>>) + Send + Sync + 'static,
    ) -> Subscription
    where
        T: Send + 'static,
    {
        self.inner.subscribe(callback)
    }
}

impl<T: Clone> Default for CertifiedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
