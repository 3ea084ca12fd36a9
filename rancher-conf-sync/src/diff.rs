//! Unified diff support for `rancher-conf diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use crate::error::io_err;
use crate::fingerprint::same_content;
use crate::SyncError;

/// Difference between a destination and its freshly rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Compare `rendered` with what is currently at `dest`.
///
/// Returns `None` exactly when publishing would leave the file untouched,
/// i.e. the bytes already match. A missing destination diffs against empty
/// content. No files are written.
pub fn diff_destination(dest: &Path, rendered: &[u8]) -> Result<Option<FileDiff>, SyncError> {
    if same_content(rendered, dest)? {
        return Ok(None);
    }
    let rendered = String::from_utf8_lossy(rendered);
    let existing = read_existing_or_empty(dest)?;

    let old_header = format!("a/{}", dest.display());
    let new_header = format!("b/{}", dest.display());
    let unified = TextDiff::from_lines(existing.as_str(), &*rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(FileDiff {
        path: dest.to_path_buf(),
        unified_diff: unified,
    }))
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}
