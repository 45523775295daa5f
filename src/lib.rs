//! sql-object-model: builds a class/property/object model from SQL seed scripts
//!
//! The model is read from `INSERT INTO` statements against the `classes`,
//! `property_definitions`, `classes_property_definitions` and `objects`
//! tables, linked across files and kept in a two-level content-hash cache.

pub mod alias;
pub mod cache;
pub mod error;
pub mod model;
pub mod parser;
pub mod processor;
pub mod settings;
pub mod util;
pub mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

pub use alias::{AliasLookup, AliasSource, AliasStore};
pub use cache::CacheState;
pub use error::{ObjectModelError, ObjectModelResult};
pub use model::{EntityInfo, EntityKind, ModelIndex, ObjectModel};
pub use processor::SqlProcessor;
pub use settings::{AutoLinkedProperty, LinkerSettings, SettingsProvider};
pub use workspace::{SqlSource, WorkspaceSource, DEFAULT_PATTERN};

/// Options for a one-shot workspace scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Directory searched for SQL files
    pub root: PathBuf,
    /// Glob matched against paths relative to `root`
    pub pattern: String,
    pub settings: LinkerSettings,
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pattern: DEFAULT_PATTERN.to_string(),
            settings: LinkerSettings::default(),
        }
    }
}

/// Build the model for every SQL file under a directory
pub async fn scan_workspace(options: ScanOptions) -> Result<Arc<ObjectModel>> {
    if !options.root.is_dir() {
        return Err(ObjectModelError::WorkspaceNotFound { path: options.root }.into());
    }

    let source = WorkspaceSource::new(&options.root, &options.pattern)?;
    let processor = SqlProcessor::new(
        Arc::new(source),
        Arc::new(options.settings),
        Arc::new(AliasStore::new()),
    );
    let model = processor.parse_all_sql_files(false).await;
    processor.dispose().await;
    Ok(model)
}
