//! Durable CEP coordinate cache.
//!
//! A JSON object on disk mapping canonical CEP to a `[lat, lon]` pair, or
//! `null` for CEPs the provider confirmed have no coordinates. The file is
//! loaded wholesale at startup and rewritten wholesale on each persist;
//! rewrites go through a temp file in the same directory followed by a
//! rename, so a crash mid-write never damages previously cached entries.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use crate::models::{Cep, Coordinate};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The store exists but cannot be parsed. Loading fails instead of
    /// starting from an empty view of a non-empty store.
    #[error("cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// In-memory view of the durable cache plus its backing file path.
///
/// Lookups are three-valued: `Some(Some(_))` resolved, `Some(None)`
/// confirmed unresolvable, `None` never attempted. Single-writer: two
/// processes sharing one cache file must be serialized externally.
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<Cep, Option<Coordinate>>,
}

impl GeocodeCache {
    /// Load the cache from disk, or start empty if the file does not
    /// exist yet.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|source| CacheError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        debug!(
            "Loaded {} cached entries from {}",
            entries.len(),
            path.display()
        );

        Ok(Self { path, entries })
    }

    pub fn get(&self, cep: &Cep) -> Option<&Option<Coordinate>> {
        self.entries.get(cep)
    }

    /// Record an outcome in memory without touching the disk.
    pub fn insert(&mut self, cep: Cep, value: Option<Coordinate>) {
        self.entries.insert(cep, value);
    }

    /// Record an outcome and immediately persist the whole mapping.
    pub fn put(&mut self, cep: Cep, value: Option<Coordinate>) -> Result<(), CacheError> {
        self.insert(cep, value);
        self.persist()
    }

    /// Atomically rewrite the backing file with the current mapping.
    pub fn persist(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(io_err)?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut tmp, &self.entries).map_err(|e| io_err(e.into()))?;
        tmp.write_all(b"\n").map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!(
            "Persisted {} entries to {}",
            self.entries.len(),
            self.path.display()
        );

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries holding a coordinate (excludes unresolvable markers).
    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|v| v.is_some()).count()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
