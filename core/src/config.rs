//! Sync configuration.
//!
//! Each concern carries its own polling interval and cache freshness
//! window; there is deliberately no single global staleness constant.

use std::path::PathBuf;
use std::time::Duration;

use deck_protocol::Concern;
use serde::Deserialize;

use crate::scheduler::DEFAULT_BATCH_LIMIT;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Base directory for the durable cache. Defaults to the platform data
    /// directory when unset.
    pub data_dir: Option<PathBuf>,
    pub version: PollConfig,
    pub cycles: PollConfig,
    pub transactions: PollConfig,
    pub custom_domain: PollConfig,
}

impl SyncConfig {
    pub fn poll(&self, concern: Concern) -> &PollConfig {
        match concern {
            Concern::Version => &self.version,
            Concern::Cycles => &self.cycles,
            Concern::Transactions => &self.transactions,
            Concern::CustomDomain => &self.custom_domain,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            version: PollConfig {
                interval_ms: 300_000,
                freshness_ms: 600_000,
                batch_limit: DEFAULT_BATCH_LIMIT,
            },
            cycles: PollConfig {
                interval_ms: 30_000,
                freshness_ms: 60_000,
                batch_limit: DEFAULT_BATCH_LIMIT,
            },
            transactions: PollConfig {
                interval_ms: 10_000,
                freshness_ms: 30_000,
                batch_limit: DEFAULT_BATCH_LIMIT,
            },
            custom_domain: PollConfig {
                interval_ms: 5_000,
                freshness_ms: 30_000,
                batch_limit: DEFAULT_BATCH_LIMIT,
            },
        }
    }
}

/// Per-concern polling parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PollConfig {
    pub interval_ms: u64,
    /// Cache entries older than this are hydrated but re-validated on the
    /// next round rather than trusted as-is.
    pub freshness_ms: u64,
    /// Concurrent remote calls per polling round.
    pub batch_limit: usize,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_millis(self.freshness_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            freshness_ms: 60_000,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}
