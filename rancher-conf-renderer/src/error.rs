//! Error types for rancher-conf-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from template rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template source file does not exist.
    #[error("template '{path}' is missing")]
    Missing { path: PathBuf },

    /// Filesystem error while reading a template.
    #[error("could not read template '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The template text does not parse.
    #[error("could not parse template '{name}': {source}")]
    Parse {
        name: String,
        #[source]
        source: tera::Error,
    },

    /// The template parsed but failed while executing.
    #[error("could not render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: tera::Error,
    },

    /// Tera context construction error.
    #[error("template context error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building lookup tables).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
