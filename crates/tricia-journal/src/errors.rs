//! Journal error types.

use std::path::PathBuf;

use tricia_session::SessionError;

/// Errors from the local store and the screen controllers.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Reading or writing the local-storage file failed.
    #[error("local storage I/O error at {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A stored value is not valid JSON for its type.
    #[error("stored value for '{key}' is invalid: {source}")]
    Corrupt {
        /// Storage key.
        key: String,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },

    /// Serialization failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The session layer failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The action needs a connected agent.
    #[error("Please wait for agent to connect")]
    AgentUnavailable,

    /// The action needs a live session.
    #[error("Not connected to agent. Please go back to chat page.")]
    NotConnected,

    /// The agent answered with a failure.
    #[error("{0}")]
    Rejected(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, JournalError>;
