//! Loading `config.toml` from disk.

use std::path::Path;

use tracing::{debug, info};

use super::path::{PathResolver, default_config_path};
use super::schema::ServerConfig;
use crate::error::{Result, TagplayError};

/// Load the configuration.
///
/// With an explicit `path` the file must exist. Without one, the default
/// location is tried and plain defaults are used when it is absent.
/// Relative asset and mapping paths are resolved against the directory of
/// the file they came from.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig> {
    let path = match path {
        Some(explicit) => {
            if !explicit.exists() {
                return Err(TagplayError::ConfigNotFound {
                    path: explicit.display().to_string(),
                });
            }
            explicit.to_path_buf()
        }
        None => match default_config_path().filter(|p| p.exists()) {
            Some(found) => found,
            None => {
                debug!("No configuration file found, using defaults");
                return Ok(ServerConfig::default());
            }
        },
    };

    let contents = std::fs::read_to_string(&path)?;
    let mut config = parse_config(&contents)?;

    let resolver = PathResolver::new(&path)?;
    config.assets.folder = resolver.resolve(&config.assets.folder)?;
    config.mapping.file = resolver.resolve(&config.mapping.file)?;

    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

/// Parse and validate a TOML configuration document.
pub fn parse_config(contents: &str) -> Result<ServerConfig> {
    let config: ServerConfig =
        toml::from_str(contents).map_err(|e| TagplayError::ConfigParse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
