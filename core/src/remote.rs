//! The remote-call collaborator boundary.
//!
//! Wire encodings are deliberately opaque here: a request names what is
//! being asked, a response is a JSON body plus the certification flag the
//! client library attached to it. Workers and services deserialize bodies
//! into the typed payloads from `deck-protocol`.

use async_trait::async_trait;
use deck_protocol::EndpointId;

/// What to ask an endpoint for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// The endpoint's deployed and released versions.
    ModuleVersion,
    /// Cycles balance and module status.
    CyclesStatus,
    /// Ledger transactions from `start_index` (inclusive) onward.
    Transactions { start_index: u64 },
    /// Registration state of the endpoint's custom domain.
    DomainStatus,
}

/// A response body plus its certification flag.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub certified: bool,
    pub body: serde_json::Value,
}

impl QueryResponse {
    pub fn uncertified(body: serde_json::Value) -> Self {
        Self {
            certified: false,
            body,
        }
    }

    pub fn certified(body: serde_json::Value) -> Self {
        Self {
            certified: true,
            body,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// Timeout or temporary unavailability; retried by the next poll tick,
    /// never immediately within the same tick.
    #[error("endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: EndpointId, reason: String },

    /// A load that requires an identity was attempted without one.
    #[error("no identity available")]
    NoIdentity,

    /// The endpoint answered but the body did not match the expected shape.
    #[error("malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: EndpointId, reason: String },
}

/// Asynchronous query function against one endpoint.
///
/// Implemented by the embedding application over its network client;
/// mocked in tests.
#[async_trait]
pub trait RemoteQuery: Send + Sync {
    async fn query(
        &self,
        endpoint: &EndpointId,
        request: QueryRequest,
    ) -> Result<QueryResponse, RemoteError>;
}
