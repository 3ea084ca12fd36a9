//! Error types for rancher-conf-core.

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by a [`MetadataSource`](crate::metadata::MetadataSource).
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The metadata endpoint could not be reached or answered with an error.
    #[error("metadata request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// The endpoint answered but the body could not be decoded.
    #[error("could not decode metadata from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Errors raised while linking a metadata snapshot into a [`Context`](crate::context::Context).
#[derive(Debug, Error)]
pub enum ContextError {
    /// A metadata fetch failed; no context was built.
    #[error("failed to fetch metadata: {0}")]
    Metadata(#[from] MetadataError),

    /// A service names a stack that is not in the snapshot.
    #[error("service '{service}' references unknown stack '{stack}'")]
    UnknownStack { service: String, stack: String },

    /// A container names a host that is not in the snapshot.
    #[error("container '{container}' references unknown host '{host}'")]
    UnknownHost { container: String, host: String },
}

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Structurally valid YAML with unusable values.
    #[error("invalid config: {0}")]
    Invalid(String),
}
