//! Typed payloads carried inside [`crate::WorkerMessage::SyncResult`] data.
//!
//! Workers serialize these into the envelope's JSON `data` field; the main
//! context deserializes them back out when applying results to the typed
//! per-endpoint stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of a module's cycles balance and runtime status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CyclesSnapshot {
    /// Remaining cycles balance. Serialized as a string: balances overflow
    /// JSON's safe integer range long before they overflow a u128.
    #[serde(with = "cycles_string")]
    pub cycles: u128,
    pub status: ModuleStatus,
    pub memory_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleStatus {
    Running,
    Stopping,
    Stopped,
}

/// One ledger transaction touching an endpoint's account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Position in the ledger; strictly increasing per account.
    pub index: u64,
    #[serde(with = "cycles_string")]
    pub amount: u128,
    pub timestamp: DateTime<Utc>,
}

/// Registration state of a custom domain attached to an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomainState {
    pub domain: String,
    pub state: RegistrationState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationState {
    PendingOrder,
    PendingChallengeResponse,
    PendingAcmeApproval,
    Available,
    Failed,
}

impl RegistrationState {
    /// Terminal states need no further polling.
    pub fn is_terminal(self) -> bool {
        matches!(self, RegistrationState::Available | RegistrationState::Failed)
    }
}

mod cycles_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map_err(D::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cycles_survive_json_as_strings() {
        let snapshot = CyclesSnapshot {
            cycles: 340_282_366_920_938_463_463_374_607_431_768_211_455,
            status: ModuleStatus::Running,
            memory_size: 4096,
        };
        let raw = serde_json::to_string(&snapshot).expect("serialize");
        assert!(raw.contains("\"340282366920938463463374607431768211455\""));
        let back: CyclesSnapshot = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(snapshot, back);
    }

    #[test]
    fn terminal_registration_states() {
        assert!(RegistrationState::Available.is_terminal());
        assert!(RegistrationState::Failed.is_terminal());
        assert!(!RegistrationState::PendingOrder.is_terminal());
        assert!(!RegistrationState::PendingAcmeApproval.is_terminal());
    }
}
