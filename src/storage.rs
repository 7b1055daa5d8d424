//! Read-only asset storage.
//!
//! The orchestrator never writes to storage. Upload, rename and delete are
//! handled elsewhere.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::assets::validate_filename;
use crate::error::{Result, TagplayError};

/// A file visible in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub name: String,
    pub size: u64,
}

/// Storage backend the orchestrator reads assets from.
pub trait AssetStorage: Send + Sync {
    /// All regular files at the storage root.
    fn list(&self) -> Result<Vec<StorageEntry>>;

    /// Whether `name` exists as a regular file.
    fn exists(&self, name: &str) -> bool;

    /// Open `name` for reading, returning the handle and its size.
    fn open(&self, name: &str) -> Result<(File, u64)>;

    /// Human-readable location, used in status output.
    fn location(&self) -> String;
}

/// Storage backed by a single directory.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// Use `root` as the asset folder, creating it if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Asset storage ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        validate_filename(name)?;
        Ok(self.root.join(name))
    }
}

impl AssetStorage for DirStorage {
    fn list(&self) -> Result<Vec<StorageEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                trace!(path = %entry.path().display(), "Skipping non-UTF-8 filename");
                continue;
            };
            entries.push(StorageEntry {
                name,
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.is_file())
    }

    fn open(&self, name: &str) -> Result<(File, u64)> {
        let path = self.path_for(name)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => TagplayError::asset_not_found(name),
            _ => TagplayError::Io(e),
        })?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(TagplayError::asset_not_found(name));
        }
        Ok((file, meta.len()))
    }

    fn location(&self) -> String {
        self.root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone())
            .display()
            .to_string()
    }
}
