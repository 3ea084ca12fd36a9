//! Content fingerprints for change detection.
//!
//! SHA-256 hex digests; only equality matters.

use std::io::ErrorKind;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};

/// Fingerprint of an in-memory buffer.
pub fn fingerprint(content: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(content);
    hex::encode(h.finalize())
}

/// Fingerprint of the file at `path`, or `None` when it does not exist.
pub fn file_fingerprint(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(fingerprint(&bytes))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(path, err)),
    }
}

/// Whether `path` already holds exactly `content`.
pub fn same_content(content: &[u8], path: &Path) -> Result<bool, SyncError> {
    let wanted = fingerprint(content);
    let current = file_fingerprint(path)?;
    tracing::debug!(
        "checksum content: {}, checksum file: {}",
        wanted,
        current.as_deref().unwrap_or("-")
    );
    Ok(current.as_deref() == Some(wanted.as_str()))
}
