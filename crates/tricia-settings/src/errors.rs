//! Settings error types.

use std::path::PathBuf;

/// Errors raised while loading or writing settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("settings io error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid JSON or has the wrong shape.
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),

    /// The file already exists and overwriting was not requested.
    #[error("settings file already exists at {0}")]
    AlreadyExists(PathBuf),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
