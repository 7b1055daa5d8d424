//! Hot-reloading mapping file resolver.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use super::{CardMapping, CardResolver, MappingDocument};
use crate::error::{Result, TagplayError};

/// File fingerprint used to detect edits.
type Stamp = (SystemTime, u64);

#[derive(Debug, Default)]
struct Cache {
    mapping: Arc<CardMapping>,
    stamp: Option<Stamp>,
    loaded: bool,
}

/// Resolver backed by a TOML, YAML or JSON file.
///
/// Every lookup compares the file's modification time and size with the
/// cached copy and re-parses on change. A file that fails to parse leaves
/// the last good mapping in place; a missing file means no cards are mapped.
#[derive(Debug)]
pub struct FileResolver {
    path: PathBuf,
    cache: Mutex<Cache>,
}

impl FileResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(Cache::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current(&self) -> Arc<CardMapping> {
        let stamp = std::fs::metadata(&self.path)
            .and_then(|meta| Ok((meta.modified()?, meta.len())))
            .ok();

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.loaded && cache.stamp == stamp {
            return Arc::clone(&cache.mapping);
        }

        if stamp.is_none() {
            if cache.loaded && cache.stamp.is_some() {
                warn!(path = %self.path.display(), "Mapping file disappeared, no cards mapped");
            } else {
                debug!(path = %self.path.display(), "Mapping file not found, no cards mapped");
            }
            cache.mapping = Arc::new(CardMapping::new());
        } else {
            match load_mapping(&self.path) {
                Ok(mapping) => {
                    info!(
                        path = %self.path.display(),
                        cards = mapping.len(),
                        "Loaded card mapping"
                    );
                    cache.mapping = Arc::new(mapping);
                }
                Err(e) => {
                    error!(
                        path = %self.path.display(),
                        error = %e,
                        "Error reading card mapping, keeping previous mapping"
                    );
                }
            }
        }

        cache.stamp = stamp;
        cache.loaded = true;
        Arc::clone(&cache.mapping)
    }
}

impl CardResolver for FileResolver {
    fn mapping(&self) -> CardMapping {
        self.current().as_ref().clone()
    }

    fn resolve(&self, card_id: &str) -> Vec<String> {
        self.current().get(card_id).cloned().unwrap_or_default()
    }

    fn invalidate(&self) {
        debug!(path = %self.path.display(), "Card mapping invalidated");
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .loaded = false;
    }
}

/// Parse a mapping file, choosing the format by extension (TOML default).
pub fn load_mapping(path: &Path) -> Result<CardMapping> {
    let contents = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let doc: MappingDocument = match ext.as_deref() {
        Some("yaml" | "yml") => serde_yaml::from_str(&contents)
            .map_err(|e| TagplayError::ConfigParse(format!("{}: {e}", path.display())))?,
        Some("json") => serde_json::from_str(&contents)
            .map_err(|e| TagplayError::ConfigParse(format!("{}: {e}", path.display())))?,
        _ => toml::from_str(&contents)
            .map_err(|e| TagplayError::ConfigParse(format!("{}: {e}", path.display())))?,
    };

    Ok(doc.normalize())
}
