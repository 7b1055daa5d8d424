//! Asset types and the asset registry.
//!
//! Asset type and MIME type come from the file extension only. File contents
//! are never inspected.

use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use crate::error::{Result, TagplayError};
use crate::storage::AssetStorage;

/// Extensions played as video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "m4v", "webm"];
/// Extensions shown as images.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"];

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Video,
    Image,
    Unknown,
}

impl AssetKind {
    /// Classify a filename by extension (case-insensitive).
    pub fn from_filename(filename: &str) -> Self {
        match extension(filename) {
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => Self::Video,
            Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Self::Image,
            _ => Self::Unknown,
        }
    }

    pub const fn is_video(self) -> bool {
        matches!(self, Self::Video)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
            Self::Unknown => "unknown",
        }
    }
}

/// MIME type for a filename from the fixed extension table.
pub fn mime_type(filename: &str) -> &'static str {
    match extension(filename).as_deref() {
        Some("mp4" | "m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("mkv") => "video/x-matroska",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("webm") => "video/webm",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Reject names that would escape the assets folder.
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename == "."
        || filename == ".."
    {
        return Err(TagplayError::InvalidArgument(format!(
            "Invalid asset filename '{filename}'"
        )));
    }
    Ok(())
}

/// A playable media file known to storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetRef {
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub size: u64,
    pub size_mb: f64,
}

impl AssetRef {
    pub fn new(filename: impl Into<String>, size: u64) -> Self {
        let filename = filename.into();
        #[allow(clippy::cast_precision_loss)]
        let size_mb = (size as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0;
        Self {
            kind: AssetKind::from_filename(&filename),
            filename,
            size,
            size_mb,
        }
    }
}

/// Lists playable assets from storage.
#[derive(Clone)]
pub struct AssetRegistry {
    storage: Arc<dyn AssetStorage>,
}

impl AssetRegistry {
    pub fn new(storage: Arc<dyn AssetStorage>) -> Self {
        Self { storage }
    }

    /// All entries with a supported extension, sorted by filename.
    ///
    /// A storage failure is logged and yields an empty list.
    pub fn list(&self) -> Vec<AssetRef> {
        let entries = match self.storage.list() {
            Ok(entries) => entries,
            Err(e) => {
                error!(error = %e, "Error listing assets");
                return Vec::new();
            }
        };

        let mut assets: Vec<AssetRef> = entries
            .into_iter()
            .map(|entry| AssetRef::new(entry.name, entry.size))
            .filter(|asset| asset.kind != AssetKind::Unknown)
            .collect();
        assets.sort_by(|a, b| a.filename.cmp(&b.filename));
        assets
    }
}
