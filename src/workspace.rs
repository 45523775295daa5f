//! SQL file discovery and reading
//!
//! The processor only sees [`SqlSource`], so tests can feed it in-memory
//! files. [`WorkspaceSource`] is the on-disk implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use glob::{MatchOptions, Pattern};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ObjectModelError, ObjectModelResult};

pub const DEFAULT_PATTERN: &str = "**/*.sql";

/// Bytes with no character assigned in Windows-1252
const UNDEFINED_WINDOWS_1252: [u8; 5] = [0x81, 0x8D, 0x8F, 0x90, 0x9D];

/// Where SQL files come from
#[async_trait]
pub trait SqlSource: Send + Sync {
    /// Paths of every SQL file currently in the set
    async fn discover(&self) -> ObjectModelResult<Vec<PathBuf>>;

    /// Raw bytes of one file
    async fn read(&self, path: &Path) -> ObjectModelResult<Vec<u8>>;
}

/// SQL files under a root directory that match a glob pattern
#[derive(Debug, Clone)]
pub struct WorkspaceSource {
    root: PathBuf,
    pattern: Pattern,
}

impl WorkspaceSource {
    pub fn new(root: impl Into<PathBuf>, pattern: &str) -> ObjectModelResult<Self> {
        let pattern = Pattern::new(pattern).map_err(|source| ObjectModelError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            root: root.into(),
            pattern,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matches(&self, relative: &Path) -> bool {
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        self.pattern.matches_with(&relative, options)
    }

    fn walk(&self) -> ObjectModelResult<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(ObjectModelError::WorkspaceNotFound {
                path: self.root.clone(),
            });
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker.filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            if self.matches(relative) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        debug!(root = %self.root().display(), files = files.len(), "Discovered SQL files");
        Ok(files)
    }
}

#[async_trait]
impl SqlSource for WorkspaceSource {
    async fn discover(&self) -> ObjectModelResult<Vec<PathBuf>> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.walk()).await?
    }

    async fn read(&self, path: &Path) -> ObjectModelResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|source| ObjectModelError::SqlFileReadError {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Decode file bytes: UTF-8 first, then Windows-1252 (common for SQL files
/// saved on Windows). A leading BOM is stripped.
///
/// Text that is not UTF-8 and contains NUL or a byte Windows-1252 leaves
/// undefined is rejected as binary or in some other encoding.
pub fn decode_source(path: &Path, bytes: &[u8]) -> ObjectModelResult<String> {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            if bytes
                .iter()
                .any(|b| *b == 0 || UNDEFINED_WINDOWS_1252.contains(b))
            {
                return Err(ObjectModelError::InvalidEncoding {
                    path: path.to_path_buf(),
                });
            }
            let (decoded, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            decoded.into_owned()
        }
    };

    Ok(match text.strip_prefix('\u{FEFF}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// SHA-256 of the raw bytes, lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
