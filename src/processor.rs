//! Model orchestration
//!
//! [`SqlProcessor`] owns the caches and drives one recompute:
//!
//! 1. Drop all caches if the alias overlay changed since the last call.
//! 2. Read and hash every discovered file concurrently.
//! 3. Return the cached aggregate if the hash map is unchanged.
//! 4. Otherwise parse files in path order (file cache first), merge them with
//!    first-seen-wins on ids, link, sort and store the new snapshot.
//!
//! Calls are serialized: a second call made while a recompute is running
//! waits for it and then usually hits the fresh aggregate.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::alias::AliasSource;
use crate::cache::{CacheState, FileHashes, ModelCache};
use crate::model::{build_model, ObjectModel, ParsedFile};
use crate::parser::parse_sql;
use crate::settings::SettingsProvider;
use crate::workspace::{content_hash, decode_source, SqlSource};

#[derive(Debug, Default)]
struct ProcessorState {
    cache: ModelCache,
    alias_changes: Option<watch::Receiver<u64>>,
}

impl ProcessorState {
    fn sync_alias_changes(&mut self, aliases: &dyn AliasSource) {
        let changes = self.alias_changes.get_or_insert_with(|| aliases.subscribe());
        if changes.has_changed().unwrap_or(false) {
            changes.borrow_and_update();
            debug!("Class aliases changed, dropping cached models");
            self.cache.invalidate();
        }
    }
}

pub struct SqlProcessor {
    source: Arc<dyn SqlSource>,
    settings: Arc<dyn SettingsProvider>,
    aliases: Arc<dyn AliasSource>,
    state: Mutex<ProcessorState>,
}

impl SqlProcessor {
    pub fn new(
        source: Arc<dyn SqlSource>,
        settings: Arc<dyn SettingsProvider>,
        aliases: Arc<dyn AliasSource>,
    ) -> Self {
        Self {
            source,
            settings,
            aliases,
            state: Mutex::new(ProcessorState::default()),
        }
    }

    /// Current linked model, recomputed only when the file set changed.
    ///
    /// `force_refresh` skips the aggregate cache; unchanged files are still
    /// served from the file cache. Failures never surface here: unreadable
    /// files are logged and left out.
    pub async fn parse_all_sql_files(&self, force_refresh: bool) -> Arc<ObjectModel> {
        let mut state = self.state.lock().await;
        state.sync_alias_changes(&*self.aliases);

        let ReadResult {
            discovered,
            contents,
        } = self.read_all().await;
        let hashes: FileHashes = contents
            .iter()
            .map(|file| (file.path.clone(), file.hash.clone()))
            .collect();

        if !force_refresh {
            if let Some(model) = state.cache.aggregate.get(&hashes) {
                debug!(files = hashes.len(), "Aggregate cache hit");
                return model;
            }
        }

        let mut merger = ModelMerger::default();
        let mut reparsed = 0usize;
        for file in &contents {
            let parsed = match state.cache.files.get(&file.path, &file.hash) {
                Some(parsed) => parsed,
                None => {
                    let text = match decode_source(&file.path, &file.bytes) {
                        Ok(text) => text,
                        Err(err) => {
                            error!(path = %file.path.display(), error = %err, "Skipping SQL file");
                            continue;
                        }
                    };
                    let parsed = Arc::new(parse_sql(&text, &file.path));
                    state
                        .cache
                        .files
                        .insert(file.path.clone(), file.hash.clone(), Arc::clone(&parsed));
                    reparsed += 1;
                    parsed
                }
            };
            merger.add(&parsed);
        }

        let settings = self.settings.settings();
        let model = Arc::new(build_model(merger.finish(), &settings, &*self.aliases));
        info!(
            files = hashes.len(),
            reparsed,
            classes = model.classes.len(),
            properties = model.properties.len(),
            objects = model.objects.len(),
            "Rebuilt object model"
        );
        // Keep entries for files that exist but could not be read this time
        if let Some(discovered) = discovered {
            let evicted = state.cache.files.retain_paths(&discovered);
            if evicted > 0 {
                debug!(evicted, "Dropped cached parses of removed files");
            }
        }
        state.cache.aggregate.store(Arc::clone(&model), hashes, reparsed);
        model
    }

    /// Read and hash every file concurrently, sorted by path.
    async fn read_all(&self) -> ReadResult {
        let paths = match self.source.discover().await {
            Ok(paths) => paths,
            Err(err) => {
                error!(error = %err, "Failed to discover SQL files");
                return ReadResult {
                    discovered: None,
                    contents: Vec::new(),
                };
            }
        };
        let discovered: HashSet<PathBuf> = paths.iter().cloned().collect();

        let mut tasks = JoinSet::new();
        for path in paths {
            let source = Arc::clone(&self.source);
            tasks.spawn(async move {
                let bytes = source.read(&path).await;
                (path, bytes)
            });
        }

        let mut contents = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((path, Ok(bytes))) => contents.push(FileContent {
                    hash: content_hash(&bytes),
                    path,
                    bytes,
                }),
                Ok((path, Err(err))) => {
                    error!(path = %path.display(), error = %err, "Failed to read SQL file")
                }
                Err(err) => error!(error = %err, "File read task failed"),
            }
        }
        contents.sort_by(|a, b| a.path.cmp(&b.path));
        ReadResult {
            discovered: Some(discovered),
            contents,
        }
    }

    /// Drop both caches.
    pub async fn invalidate_cache(&self) {
        self.state.lock().await.cache.invalidate();
    }

    /// Drop one file's parse result; the aggregate will not match again.
    pub async fn invalidate_cache_for_file(&self, path: &Path) {
        self.state.lock().await.cache.invalidate_file(path);
    }

    pub async fn cache_state(&self) -> CacheState {
        let mut state = self.state.lock().await;
        state.sync_alias_changes(&*self.aliases);
        state.cache.state()
    }

    /// When the cached aggregate was computed.
    pub async fn last_computed_at(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        state.cache.aggregate.snapshot().map(|s| s.computed_at)
    }

    /// How many files the last recompute had to parse; the rest came from the file cache.
    pub async fn last_reparsed_count(&self) -> Option<usize> {
        let state = self.state.lock().await;
        state.cache.aggregate.snapshot().map(|s| s.reparsed)
    }

    pub async fn cached_file_count(&self) -> usize {
        self.state.lock().await.cache.files.len()
    }

    /// Drop caches and the alias subscription.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        state.cache.invalidate();
        state.alias_changes = None;
        debug!("SQL processor disposed");
    }
}

struct ReadResult {
    /// Every discovered path, readable or not; `None` when discovery failed
    discovered: Option<HashSet<PathBuf>>,
    contents: Vec<FileContent>,
}

struct FileContent {
    path: PathBuf,
    hash: String,
    bytes: Vec<u8>,
}

/// Concatenates parsed files; the first file to define an id wins.
#[derive(Default)]
struct ModelMerger {
    merged: ParsedFile,
    class_ids: HashSet<String>,
    property_ids: HashSet<String>,
    object_ids: HashSet<String>,
}

impl ModelMerger {
    fn add(&mut self, parsed: &ParsedFile) {
        for class in &parsed.classes {
            if self.class_ids.insert(class.id.to_ascii_lowercase()) {
                self.merged.classes.push(class.clone());
            }
        }
        for property in &parsed.properties {
            if self.property_ids.insert(property.id.to_ascii_lowercase()) {
                self.merged.properties.push(property.clone());
            }
        }
        for object in &parsed.objects {
            if self.object_ids.insert(object.id.to_ascii_lowercase()) {
                self.merged.objects.push(object.clone());
            }
        }
        self.merged.links.extend(parsed.links.iter().cloned());
    }

    fn finish(self) -> ParsedFile {
        self.merged
    }
}
