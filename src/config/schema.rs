//! Server configuration schema.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [assets]
//! folder = "./assets"
//!
//! [mapping]
//! file = "./cards.toml"
//!
//! [events]
//! heartbeat_secs = 60
//! status_secs = 30
//! reap_secs = 30
//! channel_capacity = 64
//!
//! [media]
//! chunk_size = 8192
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TagplayError};

/// Smallest accepted media chunk size in bytes.
pub const MIN_CHUNK_SIZE: usize = 512;
/// Largest accepted media chunk size in bytes.
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub server: ListenConfig,
    pub assets: AssetsConfig,
    pub mapping: MappingConfig,
    pub events: EventsConfig,
    pub media: MediaConfig,
}

/// Listening socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Location of the media files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    pub folder: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("./assets"),
        }
    }
}

/// Location of the card → asset mapping file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MappingConfig {
    pub file: PathBuf,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("./cards.toml"),
        }
    }
}

/// Push-stream cadence and buffering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    pub heartbeat_secs: u64,
    pub status_secs: u64,
    pub reap_secs: u64,
    /// Frames buffered per subscriber before it counts as a failed write.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: 60,
            status_secs: 30,
            reap_secs: 30,
            channel_capacity: 64,
        }
    }
}

impl EventsConfig {
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub const fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_secs)
    }

    pub const fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_secs)
    }
}

/// Media transfer tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MediaConfig {
    pub chunk_size: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self { chunk_size: 8192 }
    }
}

impl ServerConfig {
    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        let events = &self.events;
        for (name, value) in [
            ("events.heartbeat_secs", events.heartbeat_secs),
            ("events.status_secs", events.status_secs),
            ("events.reap_secs", events.reap_secs),
        ] {
            if value == 0 {
                return Err(TagplayError::ConfigInvalid(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if events.channel_capacity == 0 {
            return Err(TagplayError::ConfigInvalid(
                "events.channel_capacity must be greater than 0".to_string(),
            ));
        }

        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.media.chunk_size) {
            return Err(TagplayError::ConfigInvalid(format!(
                "media.chunk_size must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE}, got {}",
                self.media.chunk_size
            )));
        }

        Ok(())
    }

    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
