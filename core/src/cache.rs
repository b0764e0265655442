//! Durable local cache mirroring uncertified per-endpoint data across
//! process restarts.
//!
//! Layout: one JSON file per entry, namespaced per concern:
//!
//! ```text
//! <base>/<concern>/<endpoint>.json   CacheEntry { value, createdAt, updatedAt }
//! ```
//!
//! Writes are atomic via a `.tmp` sibling. Persistence failures are
//! non-fatal everywhere in this codebase: in-memory stores stay
//! authoritative for the running session, and callers log and move on.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use deck_protocol::{Concern, EndpointId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("could not determine a data directory for the cache")]
    NoDataDir,
}

/// One persisted entry. `created_at` is set once on first write;
/// `updated_at` changes on every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// `None` records a confirmed-absent value.
    pub value: Option<T>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Whether the entry is inside the given freshness window. Entries
    /// outside the window are hydrated but re-validated, never trusted
    /// as-is.
    pub fn is_fresh(&self, window: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.updated_at);
        age <= chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX)
    }
}

/// On-device persistent key-value store, keyed by endpoint id.
#[derive(Debug, Clone)]
pub struct DurableCache {
    base_dir: PathBuf,
}

impl DurableCache {
    /// Cache rooted at the platform data directory.
    pub fn new() -> Result<Self, CacheError> {
        let base_dir = dirs::data_dir()
            .ok_or(CacheError::NoDataDir)?
            .join("deck")
            .join("sync-cache");
        Self::with_base_dir(base_dir)
    }

    /// Cache rooted at a custom directory (used by tests).
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn concern_dir(&self, concern: Concern) -> PathBuf {
        self.base_dir.join(concern.as_str())
    }

    fn entry_path(&self, concern: Concern, endpoint: &EndpointId) -> PathBuf {
        self.concern_dir(concern)
            .join(format!("{}.json", encode_stem(endpoint.as_str())))
    }

    /// Read every entry for a concern. Corrupt or unreadable files are
    /// logged and skipped; hydration never fails because of one bad entry.
    pub async fn hydrate<T: DeserializeOwned>(
        &self,
        concern: Concern,
    ) -> Result<HashMap<EndpointId, CacheEntry<T>>, CacheError> {
        let dir = self.concern_dir(concern);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = HashMap::new();
        while let Some(file) = read_dir.next_entry().await? {
            let path = file.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_stem)
            else {
                warn!(
                    concern = concern.as_str(),
                    path = %path.display(),
                    "skipping cache file with undecodable name"
                );
                continue;
            };
            match read_entry::<T>(&path).await {
                Ok(entry) => {
                    entries.insert(EndpointId::new(stem), entry);
                }
                Err(err) => {
                    warn!(
                        concern = concern.as_str(),
                        path = %path.display(),
                        "skipping unreadable cache entry: {err}"
                    );
                }
            }
        }
        Ok(entries)
    }

    /// Write or overwrite one entry, preserving `created_at` across
    /// updates and refreshing `updated_at`.
    pub async fn persist<T: Serialize>(
        &self,
        concern: Concern,
        endpoint: &EndpointId,
        value: Option<&T>,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(concern, endpoint);
        let now = Utc::now();
        let created_at = match read_entry::<serde_json::Value>(&path).await {
            Ok(existing) => existing.created_at,
            Err(_) => now,
        };
        let entry = CacheEntry {
            value,
            created_at,
            updated_at: now,
        };
        let json = serde_json::to_vec(&entry)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// [`DurableCache::persist`] with failures demoted to a warning.
    pub async fn persist_best_effort<T: Serialize>(
        &self,
        concern: Concern,
        endpoint: &EndpointId,
        value: Option<&T>,
    ) {
        if let Err(err) = self.persist(concern, endpoint, value).await {
            warn!(
                concern = concern.as_str(),
                endpoint = endpoint.as_str(),
                "cache write failed (in-memory state still serves): {err}"
            );
        }
    }

    /// Remove one entry; absent entries are not an error.
    pub async fn evict(&self, concern: Concern, endpoint: &EndpointId) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.entry_path(concern, endpoint)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every entry for one concern.
    pub async fn evict_concern(&self, concern: Concern) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(self.concern_dir(concern)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove everything, in lockstep with an in-memory `reset_all`.
    pub async fn evict_all(&self) -> Result<(), CacheError> {
        for concern in Concern::ALL {
            self.evict_concern(concern).await?;
        }
        Ok(())
    }
}

async fn read_entry<T: DeserializeOwned>(path: &Path) -> Result<CacheEntry<T>, CacheError> {
    let contents = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&contents)?)
}

/// Filename-safe encoding of an endpoint id. Anything outside
/// `[A-Za-z0-9_-]` (path separators included) is percent-encoded so an id
/// can never escape its concern directory.
fn encode_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

fn decode_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
