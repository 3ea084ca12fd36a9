//! In-memory [`CommandRunner`] for tests of the publish pipeline and the
//! poll loop. Compiled only for tests and the `test-support` feature.

use std::sync::{Mutex, MutexGuard};

use crate::command::{CommandOutput, CommandRunner};
use crate::error::SyncError;

/// Records commands and fails those matching a pattern.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<String>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with status 1.
    pub fn fail_when(self, pattern: impl Into<String>) -> Self {
        self.push_failure(pattern);
        self
    }

    /// Like [`fail_when`](Self::fail_when) on a runner already in use.
    pub fn push_failure(&self, pattern: impl Into<String>) {
        lock(&self.failing).push(pattern.into());
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.commands).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> Result<CommandOutput, SyncError> {
        lock(&self.commands).push(command.to_string());
        let fails = lock(&self.failing)
            .iter()
            .any(|pattern| command.contains(pattern.as_str()));
        Ok(CommandOutput {
            success: !fails,
            code: Some(if fails { 1 } else { 0 }),
            output: format!("ran {command}\n").into_bytes(),
        })
    }
}
