//! Configuration module for the tagplay server.
//!
//! Handles loading `config.toml`, filling defaults, and resolving the asset
//! folder and mapping file relative to the configuration file.

mod loader;
mod path;
mod schema;

pub use loader::{load_config, parse_config};
pub use path::{PathResolver, default_config_path, home_dir, resolve_path};
pub use schema::{
    AssetsConfig, EventsConfig, ListenConfig, MappingConfig, MediaConfig, ServerConfig,
    MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};
