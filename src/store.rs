use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Durable verdict for one catalog identity. Written once on first lookup,
/// never mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationRecord {
    Ok {
        deezer_id: i64,
        deezer_title: String,
        deezer_artist: String,
        /// 0.0 is Deezer's convention for "no BPM data".
        deezer_bpm: f64,
        deezer_duration: i64,
    },
    NotFound,
}

/// Cached track detail keyed by Deezer id, fetched lazily for identities
/// with a successful verification.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackFact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default)]
    pub bpm: f64,
    #[serde(default)]
    pub duration: i64,
}

pub type VerificationStore = JsonStore<VerificationRecord>;
pub type TrackFactStore = JsonStore<TrackFact>;

/// String-keyed JSON checkpoint store with a load-at-start /
/// flush-at-interval / flush-at-end lifecycle.
///
/// Each flush rewrites the whole document through a temp file + rename, so
/// an interrupted run keeps the last completed flush intact.
pub struct JsonStore<V> {
    path: PathBuf,
    entries: BTreeMap<String, V>,
    flush_interval: usize,
    pending: usize,
}

impl<V: Serialize + DeserializeOwned> JsonStore<V> {
    /// Open the store at `path`, loading existing entries if the file exists.
    /// A corrupt checkpoint file is an error, not an empty store; silently
    /// discarding it would re-query every identity.
    pub fn open(path: &Path, flush_interval: usize) -> Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries,
            flush_interval: flush_interval.max(1),
            pending: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert a record, flushing to disk once enough inserts accumulate.
    pub fn insert(&mut self, key: String, value: V) -> Result<()> {
        self.entries.insert(key, value);
        self.pending += 1;
        if self.pending >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    /// Write all entries to disk.
    pub fn flush(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(&self.path, json.as_bytes())?;
        self.pending = 0;
        Ok(())
    }
}

/// All-or-nothing file write: temp file in the same directory, then rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
