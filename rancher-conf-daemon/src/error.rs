use std::path::PathBuf;

use thiserror::Error;

use rancher_conf_core::{ContextError, MetadataError};
use rancher_conf_renderer::RenderError;
use rancher_conf_sync::SyncError;

/// Error surface for the poll loop and its collaborators.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to get metadata version: {0}")]
    Metadata(#[from] MetadataError),

    #[error("failed to create context from metadata: {0}")]
    Context(#[from] ContextError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{failed} of {total} template jobs failed")]
    JobsFailed { failed: usize, total: usize },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

impl DaemonError {
    /// Errors that must stop the process rather than wait for the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DaemonError::Render(_) | DaemonError::Io { .. } | DaemonError::Signal(_)
        )
    }

    /// Metadata and graph-building failures, retried after a short delay.
    pub fn is_transient(&self) -> bool {
        matches!(self, DaemonError::Metadata(_) | DaemonError::Context(_))
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
