//! Time-boxed on-disk cache for registry fetches.
//!
//! One JSON file per resource key (`models`, `tags/<family>`), each
//! holding the payload and the epoch-second fetch time. A lookup is
//! binary: hit within the TTL, or miss — expiry, absence and corruption
//! all read as a miss (logged distinctly). Writes replace the whole file
//! via a temp-file rename so a concurrent reader never sees a torn entry;
//! entries are independent, so last-writer-wins needs no locking.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

/// Stored shape of one cache entry.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoredEntry<T> {
    payload: T,
    /// Epoch seconds at store time.
    timestamp: i64,
}

/// Directory-backed cache with a fixed TTL.
#[derive(Debug, Clone)]
pub struct FetchCache {
    dir: PathBuf,
    ttl_secs: i64,
}

impl FetchCache {
    /// Cache rooted at `dir` (created lazily on first write).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: i64) -> Self {
        Self {
            dir: dir.into(),
            ttl_secs,
        }
    }

    /// Cached payload for `key`, if present and within the TTL.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now().timestamp())
    }

    /// TTL check against an explicit clock; the seam the tests use.
    pub(crate) fn get_at<T: DeserializeOwned>(&self, key: &str, now: i64) -> Option<T> {
        let path = self.entry_path(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!(key, "cache miss: no entry");
                return None;
            }
        };
        let entry: StoredEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                // Corruption reads as a miss; the next put overwrites it.
                warn!(key, error = %e, "invalid cache entry, treating as miss");
                return None;
            }
        };
        if now - entry.timestamp < self.ttl_secs {
            info!(key, "cache hit");
            Some(entry.payload)
        } else {
            debug!(key, "cache miss: entry expired");
            None
        }
    }

    /// Store `payload` under `key`, stamping the current time. Best
    /// effort: an I/O failure is logged and the cache simply stays cold.
    pub fn put<T: Serialize>(&self, key: &str, payload: &T) {
        let entry = StoredEntry {
            payload,
            timestamp: Utc::now().timestamp(),
        };
        if let Err(e) = self.write_entry(key, &entry) {
            warn!(key, error = %e, "failed to write cache entry");
        } else {
            debug!(key, "cache entry saved");
        }
    }

    /// Delete all cached entries unconditionally.
    pub fn flush_all(&self) {
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => info!(dir = %self.dir.display(), "cache flushed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "failed to flush cache"),
        }
    }

    fn write_entry<T: Serialize>(&self, key: &str, entry: &StoredEntry<T>) -> std::io::Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(entry)?;
        // Whole-entry replacement: write then rename, never in-place.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys use '/' for grouping (tags/<family>). The suffix is
        // appended rather than set_extension'd: a family like "llama3.2"
        // must not have its ".2" treated as an extension.
        let mut path = self.dir.clone();
        let mut parts = key.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                path.push(part);
            } else {
                path.push(format!("{part}.json"));
            }
        }
        path
    }

    /// Root directory of this cache.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
