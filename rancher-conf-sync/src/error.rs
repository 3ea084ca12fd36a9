//! Error types for rancher-conf-sync.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while publishing a rendered template.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The staging file could not be created or prepared.
    #[error("could not create staging file for {dest}: {source}")]
    Staging {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external command could not be started.
    #[error("could not execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The check command rejected the staged content.
    #[error("check command '{command}' failed: {status}")]
    CheckFailed { command: String, status: String },

    /// The notify command exited unsuccessfully after a publish.
    #[error("notify command '{command}' failed: {status}")]
    NotifyFailed { command: String, status: String },

    /// The copy fallback after a cross-device rename failed.
    #[error("could not copy staging file onto {dest}: {source}")]
    Fallback {
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
