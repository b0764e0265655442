//! Error taxonomy for the sync core.
//!
//! Workers never propagate errors across the message boundary; every
//! failure inside a polling round becomes a `syncError` message. The types
//! here cover the main-context paths (direct loads, cache plumbing,
//! worker lifecycle).

use deck_protocol::Concern;

use crate::cache::CacheError;
use crate::remote::RemoteError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The worker task for a concern is gone; its request channel is closed.
    #[error("{0} worker is no longer running")]
    WorkerGone(Concern),
}
