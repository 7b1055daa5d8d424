//! Error types for asset orchestration.

use thiserror::Error;

/// Primary error type for tagplay operations.
#[derive(Error, Debug)]
pub enum TagplayError {
    // Lookup errors
    #[error("{what} not found")]
    NotFound { what: String },

    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not applicable: {0}")]
    Conflict(String),

    // Configuration errors
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    #[error("Configuration parse error: {0}")]
    ConfigParse(String),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    // Web server errors
    #[error("Server failed to start on {addr}: {reason}")]
    ServerFailed { addr: String, reason: String },

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TagplayError {
    /// Shorthand for a `NotFound` describing an asset file.
    pub fn asset_not_found(filename: &str) -> Self {
        Self::NotFound {
            what: format!("Asset '{filename}'"),
        }
    }

    /// Returns true if the error is recoverable by the user.
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidArgument(_)
                | Self::Conflict(_)
                | Self::ConfigNotFound { .. }
                | Self::ConfigInvalid(_)
        )
    }

    /// Stable machine-readable name of the error category.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Conflict(_) => "conflict",
            Self::ConfigNotFound { .. } | Self::ConfigParse(_) | Self::ConfigInvalid(_) => "config",
            Self::ServerFailed { .. } => "server",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns a suggestion for how to fix the error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Check the assets folder and the card mapping file"),
            Self::Conflict(_) => Some("Map more than one asset to the card to enable navigation"),
            Self::ConfigNotFound { .. } => Some("Pass --config or create the file with defaults"),
            Self::ServerFailed { .. } => Some("Use --port to pick a free port"),
            _ => None,
        }
    }
}

/// Convenience type alias for Results using TagplayError.
pub type Result<T> = std::result::Result<T, TagplayError>;

/// Extension trait for adding context to errors.
pub trait ResultExt<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| TagplayError::Internal(format!("{}: {e}", f().into())))
    }
}
