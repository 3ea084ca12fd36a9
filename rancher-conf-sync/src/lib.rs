//! # rancher-conf-sync
//!
//! Change-gated publishing of rendered templates.
//!
//! [`Publisher::publish`] compares the rendered bytes with the destination,
//! stages them next to it, runs the optional check command, swaps the file
//! into place and runs the optional notify command. [`diff_destination`]
//! previews the same change without touching the filesystem.

pub mod command;
pub mod diff;
pub mod error;
pub mod fingerprint;
#[cfg(any(test, feature = "test-support"))]
pub mod recording;
pub mod writer;

pub use command::{log_output, CommandOutput, CommandRunner, ShellRunner};
pub use diff::{diff_destination, FileDiff};
pub use error::SyncError;
pub use fingerprint::{file_fingerprint, fingerprint, same_content};
#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingRunner;
pub use writer::{Publisher, WriteResult};
