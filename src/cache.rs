//! Two-level content-hash cache
//!
//! - [`FileCache`] keeps the parse result of each file, keyed by path and
//!   valid only while the file's content hash is unchanged.
//! - [`AggregateCache`] keeps the last linked model together with the hash
//!   map it was built from. It is valid only when the current hash map is
//!   identical: same paths, same hashes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{ObjectModel, ParsedFile};

/// Content hash per file path
pub type FileHashes = BTreeMap<PathBuf, String>;

#[derive(Debug, Clone)]
struct FileEntry {
    hash: String,
    parsed: Arc<ParsedFile>,
}

/// Per-file parse results
#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, FileEntry>,
}

impl FileCache {
    /// Cached parse result for `path`, if it was parsed from content with `hash`.
    pub fn get(&self, path: &Path, hash: &str) -> Option<Arc<ParsedFile>> {
        self.entries
            .get(path)
            .filter(|entry| entry.hash == hash)
            .map(|entry| Arc::clone(&entry.parsed))
    }

    pub fn insert(&mut self, path: PathBuf, hash: String, parsed: Arc<ParsedFile>) {
        self.entries.insert(path, FileEntry { hash, parsed });
    }

    pub fn invalidate(&mut self, path: &Path) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Drop entries whose path is not in `paths`; returns how many were dropped.
    pub fn retain_paths(&mut self, paths: &HashSet<PathBuf>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|path, _| paths.contains(path));
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The last linked model and the inputs it was built from
#[derive(Debug, Clone)]
pub struct AggregateSnapshot {
    pub model: Arc<ObjectModel>,
    pub file_hashes: FileHashes,
    pub computed_at: DateTime<Utc>,
    /// Files parsed for this snapshot rather than served from the file cache
    pub reparsed: usize,
}

#[derive(Debug, Default)]
pub struct AggregateCache {
    snapshot: Option<AggregateSnapshot>,
}

impl AggregateCache {
    pub fn is_valid(&self, current: &FileHashes) -> bool {
        self.snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.file_hashes == *current)
    }

    /// The cached model when it was built from exactly `current`.
    pub fn get(&self, current: &FileHashes) -> Option<Arc<ObjectModel>> {
        self.snapshot
            .as_ref()
            .filter(|snapshot| snapshot.file_hashes == *current)
            .map(|snapshot| Arc::clone(&snapshot.model))
    }

    pub fn store(&mut self, model: Arc<ObjectModel>, file_hashes: FileHashes, reparsed: usize) {
        self.snapshot = Some(AggregateSnapshot {
            model,
            file_hashes,
            computed_at: Utc::now(),
            reparsed,
        });
    }

    pub fn snapshot(&self) -> Option<&AggregateSnapshot> {
        self.snapshot.as_ref()
    }

    /// Drop one path from the recorded hash map, so the next comparison fails.
    pub fn forget_file(&mut self, path: &Path) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            snapshot.file_hashes.remove(path);
        }
    }

    pub fn clear(&mut self) {
        self.snapshot = None;
    }
}

/// Whether a model has been computed and not invalidated since
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    Populated,
}

#[derive(Debug, Default)]
pub struct ModelCache {
    pub files: FileCache,
    pub aggregate: AggregateCache,
}

impl ModelCache {
    pub fn invalidate(&mut self) {
        self.files.clear();
        self.aggregate.clear();
        debug!("Cleared all cached models");
    }

    pub fn invalidate_file(&mut self, path: &Path) {
        let removed = self.files.invalidate(path);
        self.aggregate.forget_file(path);
        debug!(path = %path.display(), removed, "Invalidated cached file");
    }

    pub fn state(&self) -> CacheState {
        if self.aggregate.snapshot().is_some() {
            CacheState::Populated
        } else {
            CacheState::Empty
        }
    }
}
