//! Error types for slimductor-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Storage failure on the entry directory or one of its files
    /// (unreadable, unwritable, disk full, permission denied).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An entry file exists but is not a valid session record.
    #[error("malformed session entry at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error (write path).
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// YAML parse error on the optional config file.
    #[error("failed to parse config at {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `read` found no entry for the session.
    #[error("no session entry for '{session_id}'")]
    EntryNotFound { session_id: String },

    /// A role change was requested for a session that is not registered.
    #[error("session '{session_id}' is not registered; run `slimductor register` first")]
    NotRegistered { session_id: String },

    /// The session id cannot be used as a file name.
    #[error("invalid session id '{session_id}'")]
    InvalidSessionId { session_id: String },

    /// `dirs::home_dir()` returned `None`; cannot locate `~/.claude/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}
