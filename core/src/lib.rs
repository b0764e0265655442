//! Client-side state synchronization core for the Deck console.
//!
//! Keeps the UI informed about a variable number of remote stateful
//! modules without blocking the interface thread and without re-fetching
//! unnecessarily:
//!
//! - observable per-endpoint stores with precise not-loaded / empty /
//!   loaded semantics ([`store`]);
//! - certified vs. uncertified reconciliation ([`store::certified`]);
//! - a durable on-disk cache so the UI has instant data on restart
//!   ([`cache`]);
//! - background workers polling one concern each over message channels
//!   ([`worker`], [`scheduler`]);
//! - a semver feature gate selecting wire-compatible request shapes
//!   ([`gate`]).
//!
//! [`service::SyncService`] wires it all together for the main context.

pub mod cache;
pub mod config;
pub mod error;
pub mod gate;
pub mod remote;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod worker;

pub use cache::{CacheEntry, CacheError, DurableCache};
pub use config::{PollConfig, SyncConfig};
pub use error::SyncError;
pub use gate::is_feature_supported;
pub use remote::{QueryRequest, QueryResponse, RemoteError, RemoteQuery};
pub use service::{Notifier, SyncService};
pub use store::{
    Certified, CertifiedStore, EndpointStore, EntryState, MapState, Observable, StoreRegistry,
    Subscription,
};
