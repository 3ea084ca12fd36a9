//! External command execution for check and notify hooks.
//!
//! The pipeline never spawns processes directly; it goes through a
//! [`CommandRunner`] so tests can record the exact command strings.

use std::process::Command;

use crate::error::SyncError;

/// Result of running one command to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Standard output followed by standard error.
    pub output: Vec<u8>,
}

impl CommandOutput {
    /// Human-readable exit status for error messages.
    pub fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Runs a shell command string to completion.
///
/// There is no timeout; a command that never exits stalls the caller.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<CommandOutput, SyncError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(&self, command: &str) -> Result<CommandOutput, SyncError> {
        (**self).run(command)
    }
}

/// Runs commands through `/bin/sh -c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<CommandOutput, SyncError> {
        let out = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|source| SyncError::Spawn {
                command: command.to_string(),
                source,
            })?;
        let mut output = out.stdout;
        output.extend_from_slice(&out.stderr);
        Ok(CommandOutput {
            success: out.status.success(),
            code: out.status.code(),
            output,
        })
    }
}

/// Log every non-empty output line tagged with the originating command.
pub fn log_output(command: &str, output: &[u8]) {
    for line in String::from_utf8_lossy(output).lines() {
        if !line.is_empty() {
            tracing::info!("[{}]: {:?}", command, line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_runner_captures_both_streams() {
        let out = ShellRunner.run("echo out; echo err 1>&2").unwrap();
        assert!(out.success);
        assert_eq!(out.code, Some(0));
        assert_eq!(String::from_utf8_lossy(&out.output), "out\nerr\n");
    }

    #[test]
    fn shell_runner_reports_exit_code() {
        let out = ShellRunner.run("exit 3").unwrap();
        assert!(!out.success);
        assert_eq!(out.status(), "exit status 3");
    }
}
