//! Result Store
//!
//! Bounded, most-recent-first history of analysis results, persisted as a
//! single versioned JSON document. Every mutation rewrites the whole file
//! (temp file + rename) so a crash never leaves a torn history behind.
//!
//! Loading never fails: a missing file, an unreadable file, or a file written
//! under a different format version all yield an empty store.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::result::StoredResult;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{absolutize, ensure_dir};

/// Format tag written with every history file
pub const RESULTS_FORMAT_VERSION: &str = "2.0.0";

/// On-disk layout
#[derive(Debug, Serialize, Deserialize)]
struct PersistedResults {
    version: String,
    entries: Vec<StoredResult>,
}

/// Just enough of the document to gate on the version before parsing entries
#[derive(Debug, Deserialize)]
struct VersionHeader {
    version: String,
}

/// Persistent, capacity-bounded result history
#[derive(Debug)]
pub struct ResultStore {
    data_path: PathBuf,
    capacity: usize,
    entries: Vec<StoredResult>,
}

impl ResultStore {
    /// Create an empty store that persists to `data_path`.
    pub fn new(data_path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            data_path: data_path.into(),
            capacity: capacity.max(1),
            entries: Vec::new(),
        }
    }

    /// Load the history at `data_path`, or start empty.
    pub fn load(data_path: impl Into<PathBuf>, capacity: usize) -> Self {
        let mut store = Self::new(data_path, capacity);

        match Self::read_entries(&store.data_path) {
            Ok(Some(entries)) => {
                store.entries = entries;
                store.enforce_capacity();
                tracing::info!(
                    "[ResultStore] Loaded {} results from {}",
                    store.entries.len(),
                    store.data_path.display()
                );
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "[ResultStore] Ignoring unreadable history {}: {}",
                    store.data_path.display(),
                    e
                );
            }
        }

        store
    }

    /// `Ok(None)` for a missing file or a version mismatch.
    fn read_entries(path: &Path) -> AppResult<Option<Vec<StoredResult>>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)?;
        let header: VersionHeader = serde_json::from_str(&content)?;
        if header.version != RESULTS_FORMAT_VERSION {
            tracing::info!(
                "[ResultStore] Discarding history with version {} (expected {})",
                header.version,
                RESULTS_FORMAT_VERSION
            );
            return Ok(None);
        }

        let persisted: PersistedResults = serde_json::from_str(&content)?;
        Ok(Some(persisted.entries))
    }

    /// Insert or replace the result for `path` at the most-recent position,
    /// then rewrite the history file.
    ///
    /// On a write failure the in-memory store is already updated; the error
    /// only means the change is not durable.
    pub fn put(
        &mut self,
        path: impl AsRef<Path>,
        timestamp: DateTime<Local>,
        report: impl Into<String>,
    ) -> AppResult<()> {
        let key = absolutize(path.as_ref());
        self.entries.retain(|entry| entry.path != key);
        self.entries
            .insert(0, StoredResult::new(key, timestamp, report));
        self.enforce_capacity();
        self.save()
    }

    /// Exact lookup on the absolute path
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&StoredResult> {
        let key = absolutize(path.as_ref());
        self.entries.iter().find(|entry| entry.path == key)
    }

    /// Drop entries whose path no longer satisfies `is_valid`.
    ///
    /// Returns how many were removed. The file is rewritten only if something
    /// changed.
    pub fn prune<F>(&mut self, is_valid: F) -> AppResult<usize>
    where
        F: Fn(&Path) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|entry| is_valid(&entry.path));
        let removed = before - self.entries.len();

        if removed > 0 {
            tracing::debug!("[ResultStore] Pruned {} stale results", removed);
            self.save()?;
        }
        Ok(removed)
    }

    /// Paths in most-recent-first order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|entry| entry.path.clone()).collect()
    }

    /// Entries in most-recent-first order
    pub fn entries(&self) -> &[StoredResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Location of the history file
    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn enforce_capacity(&mut self) {
        if self.entries.len() > self.capacity {
            let evicted = self.entries.len() - self.capacity;
            self.entries.truncate(self.capacity);
            tracing::debug!("[ResultStore] Evicted {} least recent results", evicted);
        }
    }

    /// Rewrite the history file atomically.
    pub fn save(&self) -> AppResult<()> {
        self.write_file().map_err(|e| {
            tracing::warn!(
                "[ResultStore] Failed to write {}: {}",
                self.data_path.display(),
                e
            );
            AppError::persistence(format!("{}: {}", self.data_path.display(), e))
        })
    }

    fn write_file(&self) -> AppResult<()> {
        if let Some(parent) = self.data_path.parent() {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let persisted = PersistedResults {
            version: RESULTS_FORMAT_VERSION.to_string(),
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string(&persisted)?;

        // Write atomically by writing to temp file then renaming
        let temp_path = self.data_path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;

        // On Windows, we need to remove the destination first if it exists
        if cfg!(windows) && self.data_path.exists() {
            fs::remove_file(&self.data_path)?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.data_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }
}
