//! Message and data types shared between the main context and the
//! background sync workers.
//!
//! Everything crossing a worker boundary is a [`WorkerMessage`]: a
//! `kind`-tagged envelope with a kind-specific payload. The same vocabulary
//! is used in both directions; direction of travel disambiguates.

pub mod endpoint;
pub mod message;
pub mod payload;
pub mod version;

pub use endpoint::{Concern, EndpointId};
pub use message::{WorkerMessage, decode, encode};
pub use payload::{
    CustomDomainState, CyclesSnapshot, ModuleStatus, RegistrationState, TransactionRecord,
};
pub use version::{PackageInfo, VersionMetadata};
