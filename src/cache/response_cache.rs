//! Write-through response cache persisted as a single JSON file.
//!
//! Defaults to `~/.storyloom/cache/responses.json`. The whole mapping is held
//! in memory and rewritten atomically (temp file + rename) on every `put`, so
//! the file on disk always matches memory once a write returns. Entries never
//! expire and are never evicted.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::key::CacheKey;
use crate::error::{Result, StoryError};

/// On-disk layout: `{ "<key>": <payload>, ... }` with keys in sorted order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
struct CacheStore {
    entries: BTreeMap<CacheKey, Value>,
}

/// Persistent key/value cache of upstream responses.
///
/// Only obtainable through [`ResponseCache::load`] or
/// [`ResponseCache::try_load`], so every instance is ready to serve.
#[derive(Debug)]
pub struct ResponseCache {
    store: CacheStore,
    path: PathBuf,
}

impl ResponseCache {
    /// Load the cache, falling back to an empty mapping when the backing file
    /// is unreadable or corrupt.
    ///
    /// A corrupt file is left in place and replaced by the next successful
    /// [`put`](Self::put).
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(path.clone()) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Response cache is unusable, starting empty");
                Self {
                    store: CacheStore::default(),
                    path,
                }
            }
        }
    }

    /// Load the cache, surfacing [`StoryError::CacheLoad`] for an unreadable
    /// or corrupt backing file. A missing file yields an empty cache.
    pub fn try_load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let store = read_store(&path).map_err(|reason| StoryError::CacheLoad {
            path: path.clone(),
            reason,
        })?;
        debug!(
            path = %path.display(),
            entries = store.entries.len(),
            "Loaded response cache"
        );
        Ok(Self { store, path })
    }

    /// Look up a cached payload.
    pub fn get(&self, key: &CacheKey) -> Option<&Value> {
        self.store.entries.get(key)
    }

    /// Insert or overwrite `key`, then persist the whole mapping.
    ///
    /// On a write failure the entry stays in memory for the rest of the run
    /// and [`StoryError::CacheWrite`] is returned.
    pub fn put(&mut self, key: CacheKey, value: Value) -> Result<()> {
        debug!(key = %key.short(), "Caching response");
        self.store.entries.insert(key, value);
        self.persist()
    }

    /// Remove every entry and persist the empty mapping.
    pub fn clear(&mut self) -> Result<()> {
        self.store.entries.clear();
        self.persist()
    }

    /// Return aggregate statistics about the cache.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.store.entries.len(),
            file_bytes: fs::metadata(&self.path).map(|m| m.len()).ok(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.store.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.store.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.entries.is_empty()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // -- private helpers ---------------------------------------------------

    fn persist(&self) -> Result<()> {
        write_store(&self.path, &self.store).map_err(|source| StoryError::CacheWrite {
            path: self.path.clone(),
            source,
        })
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries currently in the cache.
    pub total_entries: usize,
    /// Size of the backing file, if it exists.
    pub file_bytes: Option<u64>,
}

fn read_store(path: &Path) -> std::result::Result<CacheStore, String> {
    let mut data = String::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_string(&mut data).map_err(|e| e.to_string())?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheStore::default()),
        Err(e) => return Err(e.to_string()),
    }
    if data.trim().is_empty() {
        return Ok(CacheStore::default());
    }
    serde_json::from_str(&data).map_err(|e| e.to_string())
}

fn write_store(path: &Path, store: &CacheStore) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    // Temp file in the same directory so the final rename stays on one filesystem.
    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, store)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
