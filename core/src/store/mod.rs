//! Observable stores feeding the UI.
//!
//! All state the interface renders flows through these containers: a
//! minimal publish/subscribe value holder, a certified-value wrapper
//! (not loaded / optimistic / verified), and keyed per-endpoint maps
//! preserving the never-attempted vs. tried-and-empty distinction.

pub mod certified;
pub mod endpoint_map;
pub mod observable;
pub mod registry;

pub use certified::Certified;
pub use endpoint_map::{CertifiedStore, EndpointStore, EntryState, MapState};
pub use observable::{Observable, Subscription};
pub use registry::StoreRegistry;
