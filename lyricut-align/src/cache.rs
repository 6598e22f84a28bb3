//! Song-keyed artifact caches.
//!
//! Two caches back the pipeline: transcripts (expensive external calls) and
//! aligned phrases (the run's end product). Both store one JSON record per
//! song. The cache is the only idempotence mechanism the engine has, so
//! writes are atomic (temp file plus rename) and unreadable records degrade
//! to a miss instead of failing the song.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lyricut_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::types::SongId;

/// Song-keyed record store.
///
/// Each song worker touches only its own key, so implementations need no
/// cross-key coordination beyond being safe to share.
pub trait Cache<T>: Send + Sync {
    /// Fetch the record for a song. `Ok(None)` on miss.
    fn get(&self, id: &SongId) -> Result<Option<T>>;
    /// Store or replace the record for a song.
    fn put(&self, id: &SongId, record: &T) -> Result<()>;
    /// Drop the record for a song. Absent records are not an error.
    fn invalidate(&self, id: &SongId) -> Result<()>;
}

/// Serialize a value to JSON at `path` via a temp file in the same
/// directory, so readers never observe a partial record.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("create {}: {}", parent.display(), e),
            ))
        })?;
    }
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| Error::Cache(format!("serialize {}: {}", path.display(), e)))?;
    let tmp = tmp_path(path);
    fs::write(&tmp, &json).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("write {}: {}", tmp.display(), e),
        ))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("rename {} -> {}: {}", tmp.display(), path.display(), e),
        ))
    })?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// One-JSON-file-per-song cache rooted at a directory.
pub struct JsonFileCache<T> {
    root: PathBuf,
    _record: PhantomData<T>,
}

impl<T> JsonFileCache<T> {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            Error::Cache(format!("create cache dir {}: {}", root.display(), e))
        })?;
        Ok(Self {
            root,
            _record: PhantomData,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &SongId) -> PathBuf {
        // SongId is already filesystem-safe.
        self.root.join(format!("{}.json", id))
    }
}

impl<T> Cache<T> for JsonFileCache<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, id: &SongId) -> Result<Option<T>> {
        let path = self.record_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Cache(format!("read {}: {}", path.display(), e)));
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // Treat as a miss; the record will be rebuilt and replaced.
                warn!(
                    song_id = %id,
                    path = %path.display(),
                    error = %e,
                    "Discarding unreadable cache record"
                );
                let _ = fs::remove_file(&path);
                Ok(None)
            }
        }
    }

    fn put(&self, id: &SongId, record: &T) -> Result<()> {
        write_json_atomic(&self.record_path(id), record)
    }

    fn invalidate(&self, id: &SongId) -> Result<()> {
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Cache(format!("invalidate {}: {}", id, e))),
        }
    }
}

/// In-memory cache for tests and embedders that want no disk state.
#[derive(Default)]
pub struct MemoryCache<T> {
    records: Mutex<HashMap<SongId, T>>,
}

impl<T> MemoryCache<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl<T> Cache<T> for MemoryCache<T>
where
    T: Clone + Send + Sync,
{
    fn get(&self, id: &SongId) -> Result<Option<T>> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    fn put(&self, id: &SongId, record: &T) -> Result<()> {
        self.records.lock().unwrap().insert(id.clone(), record.clone());
        Ok(())
    }

    fn invalidate(&self, id: &SongId) -> Result<()> {
        self.records.lock().unwrap().remove(id);
        Ok(())
    }
}
