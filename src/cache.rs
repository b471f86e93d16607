use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// A previously resolved stream URL and the epoch second it was observed at.
///
/// `ts` is always the resolution time of the overwrite that produced the
/// entry, never backdated, so it only moves forward per key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub url: String,
    pub ts: i64,
}

/// Whole-file snapshot cache of resolved stream URLs, keyed by channel URL.
///
/// Entries never expire from storage; freshness is enforced at read time via
/// [`StreamCache::get_if_fresh`]. Every load and persist failure degrades to
/// "no cache" - callers never see an error from this store.
#[derive(Debug, Default)]
pub struct StreamCache {
    entries: HashMap<String, CacheEntry>,
    path: Option<PathBuf>,
}

impl StreamCache {
    /// A cache with no backing file. [`StreamCache::persist`] is a no-op.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path`, or an empty store bound to `path` when
    /// the file is missing, unreadable or malformed.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_snapshot(&raw),
            Err(e) => {
                debug!("No usable cache snapshot at {}: {e}", path.display());
                HashMap::new()
            }
        };

        Self {
            entries,
            path: Some(path),
        }
    }

    /// Returns the cached URL for `key` only while `now - ts <= ttl_secs`.
    ///
    /// Expired entries stay in the store but never match.
    #[must_use]
    pub fn get_if_fresh(&self, key: &str, ttl_secs: i64, now: i64) -> Option<&str> {
        let entry = self.entries.get(key)?;
        (now - entry.ts <= ttl_secs).then_some(entry.url.as_str())
    }

    /// Inserts or overwrites the entry for `key` with `ts = now`.
    pub fn put(&mut self, key: &str, url: &str, now: i64) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                url: url.to_string(),
                ts: now,
            },
        );
    }

    /// Best-effort full-snapshot write. Failures are logged and swallowed -
    /// caching is an optimization, never required for correctness.
    pub async fn persist(&self) {
        let Some(path) = &self.path else { return };

        let json = match serde_json::to_string(&self.entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("Unable to serialize stream cache: {e}");
                return;
            }
        };

        if let Err(e) = write_snapshot(path, &json).await {
            warn!("Unable to persist stream cache to {}: {e:#}", path.display());
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tolerant per-entry parse: a malformed entry is dropped, the rest of the
/// snapshot is still used. A wholly malformed snapshot parses as empty.
fn parse_snapshot(raw: &str) -> HashMap<String, CacheEntry> {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
        warn!("Cache snapshot is malformed, starting with an empty cache");
        return HashMap::new();
    };

    let mut entries = HashMap::new();
    for (key, value) in map {
        let Some(url) = value["url"].as_str() else {
            continue;
        };
        let Some(ts) = value["ts"].as_i64() else {
            continue;
        };
        entries.insert(
            key,
            CacheEntry {
                url: url.to_string(),
                ts,
            },
        );
    }

    entries
}

/// Write-then-rename so a concurrent reader of the previous snapshot never
/// observes a torn file.
async fn write_snapshot(path: &Path, json: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Creating cache directory")?;
    }

    let staging = path.with_extension("tmp");
    tokio::fs::write(&staging, json)
        .await
        .context("Writing cache snapshot")?;
    tokio::fs::rename(&staging, path)
        .await
        .context("Replacing cache snapshot")?;

    Ok(())
}
