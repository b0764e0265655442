//! The `kind`-tagged envelope exchanged with background workers.

use serde::{Deserialize, Serialize};

use crate::endpoint::EndpointId;

/// A message crossing the main/worker boundary, in either direction.
///
/// Requests (main → worker) and responses (worker → main) share the same
/// envelope shape and tag vocabulary; the direction of travel tells them
/// apart, not a separate namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum WorkerMessage {
    /// main → worker: enter the Polling state for the given targets.
    #[serde(rename_all = "camelCase")]
    StartPolling {
        targets: Vec<EndpointId>,
        interval_ms: u64,
    },
    /// main → worker: cancel the timer and return to Idle.
    StopPolling,
    /// worker → main: one endpoint's result from a polling round.
    ///
    /// `data: None` encodes a confirmed-absent value (the endpoint was
    /// reached and reported nothing), which is distinct from the endpoint
    /// never having been polled.
    #[serde(rename_all = "camelCase")]
    SyncResult {
        endpoint_id: EndpointId,
        data: Option<serde_json::Value>,
        certified: bool,
    },
    /// worker → main: one endpoint's failure from a polling round.
    #[serde(rename_all = "camelCase")]
    SyncError {
        endpoint_id: EndpointId,
        error: String,
    },
}

/// Serialize a message for a context boundary that needs a byte transport.
pub fn encode(message: &WorkerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

/// Decode a raw envelope, ignoring unrecognized `kind` values.
///
/// Unknown kinds are a forward-compatible no-op, never an error: a newer
/// peer may emit vocabulary this build does not know about yet. Malformed
/// payloads for a known kind are also dropped (logged at debug).
pub fn decode(raw: &str) -> Option<WorkerMessage> {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!("discarding unparseable worker message: {err}");
            return None;
        }
    };
    let kind = value.get("kind").and_then(|k| k.as_str())?;
    match serde_json::from_value::<WorkerMessage>(value.clone()) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!(kind, "discarding worker message: {err}");
            None
        }
    }
}
