use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Opaque textual identifier of a remote module instance.
///
/// Stable for the lifetime of the module; used as the map key in every
/// per-endpoint store and as the durable cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EndpointId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for EndpointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The polling concerns, one background worker each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Concern {
    /// Module version registry.
    Version,
    /// Cycles balance and module status monitoring.
    Cycles,
    /// Ledger transaction polling.
    Transactions,
    /// Custom-domain registration watch.
    CustomDomain,
}

impl Concern {
    /// Stable name, used for cache namespaces and log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Concern::Version => "version",
            Concern::Cycles => "cycles",
            Concern::Transactions => "transactions",
            Concern::CustomDomain => "custom-domain",
        }
    }

    pub const ALL: [Concern; 4] = [
        Concern::Version,
        Concern::Cycles,
        Concern::Transactions,
        Concern::CustomDomain,
    ];
}

impl fmt::Display for Concern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
