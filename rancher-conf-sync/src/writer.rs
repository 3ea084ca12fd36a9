//! Publish pipeline for one rendered template.
//!
//! ## `Publisher::publish`: protocol
//!
//! 1. No destination → write the bytes to stdout and stop.
//! 2. Fingerprint the rendered bytes and the current destination.
//! 3. Equal → nothing to do.
//! 4. Stage the bytes in a temp file next to the destination, copying the
//!    destination's mode and owner when it exists.
//! 5. Run the check command against the staging file, if any.
//! 6. Rename the staging file onto the destination. A cross-device or busy
//!    rename falls back to copying the bytes and re-applying ownership.
//! 7. The staging file is removed on every path (it is a `TempPath`).
//! 8. Run the notify command, if any.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

use rancher_conf_core::{TemplateJob, STAGING_PLACEHOLDER};

use crate::command::{log_output, CommandRunner};
use crate::error::{io_err, SyncError};
use crate::fingerprint::same_content;

type RenameFn = fn(&Path, &Path) -> io::Result<()>;

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of publishing one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// No destination configured; content went to stdout.
    Printed,
    /// Destination was replaced with new content.
    Written { path: PathBuf },
    /// Destination already held the rendered content.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the destination *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn is_change(&self) -> bool {
        matches!(self, WriteResult::Written { .. } | WriteResult::WouldWrite { .. })
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Publishes rendered bytes to template destinations.
pub struct Publisher<R> {
    runner: R,
    dry_run: bool,
    rename: RenameFn,
}

impl<R: CommandRunner> Publisher<R> {
    pub fn new(runner: R) -> Self {
        Publisher {
            runner,
            dry_run: false,
            rename: |from, to| fs::rename(from, to),
        }
    }

    /// Report changes without staging, checking, writing, or notifying.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Publish `content` for `job`, printing to the process stdout when the
    /// job has no destination.
    pub fn publish(&self, job: &TemplateJob, content: &[u8]) -> Result<WriteResult, SyncError> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.publish_to(job, content, &mut lock)
    }

    /// Like [`publish`](Self::publish) with an explicit stdout sink.
    pub fn publish_to(
        &self,
        job: &TemplateJob,
        content: &[u8],
        stdout: &mut dyn Write,
    ) -> Result<WriteResult, SyncError> {
        let Some(dest) = job.dest.as_deref().filter(|d| !d.as_os_str().is_empty()) else {
            tracing::debug!("no destination specified, printing to stdout");
            stdout
                .write_all(content)
                .and_then(|()| stdout.flush())
                .map_err(|e| io_err("<stdout>", e))?;
            return Ok(WriteResult::Printed);
        };

        if same_content(content, dest)? {
            tracing::debug!("destination {} is up to date", dest.display());
            return Ok(WriteResult::Unchanged {
                path: dest.to_path_buf(),
            });
        }

        if self.dry_run {
            tracing::info!("[dry-run] would write: {}", dest.display());
            return Ok(WriteResult::WouldWrite {
                path: dest.to_path_buf(),
            });
        }

        let staging = stage(content, dest)?;

        if let Some(check) = &job.check_cmd {
            self.check(check, &staging)?;
        }

        tracing::debug!("writing destination {}", dest.display());
        replace_destination(&staging, dest, self.rename)?;
        drop(staging);
        tracing::info!("destination file {} has been updated", dest.display());

        if let Some(notify) = &job.notify_cmd {
            self.notify(notify, job.notify_output)?;
        }

        Ok(WriteResult::Written {
            path: dest.to_path_buf(),
        })
    }

    fn check(&self, command: &str, staging: &Path) -> Result<(), SyncError> {
        let staging = std::path::absolute(staging).map_err(|e| io_err(staging, e))?;
        let command = command.replace(STAGING_PLACEHOLDER, &staging.to_string_lossy());
        tracing::debug!("running check command '{}'", command);
        let out = self.runner.run(&command)?;
        if !out.success {
            log_output(&command, &out.output);
            return Err(SyncError::CheckFailed {
                status: out.status(),
                command,
            });
        }
        tracing::debug!(
            "check cmd output: {:?}",
            String::from_utf8_lossy(&out.output)
        );
        Ok(())
    }

    fn notify(&self, command: &str, verbose: bool) -> Result<(), SyncError> {
        tracing::info!("executing notify command '{}'", command);
        let out = self.runner.run(command)?;
        if !out.success {
            log_output(command, &out.output);
            return Err(SyncError::NotifyFailed {
                command: command.to_string(),
                status: out.status(),
            });
        }
        if verbose {
            log_output(command, &out.output);
        }
        tracing::debug!(
            "notify cmd output: {:?}",
            String::from_utf8_lossy(&out.output)
        );
        Ok(())
    }
}

#[cfg(test)]
impl<R: CommandRunner> Publisher<R> {
    fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Write `content` to a hidden temp file in `dest`'s directory.
///
/// The returned path deletes the file when dropped.
fn stage(content: &[u8], dest: &Path) -> Result<TempPath, SyncError> {
    let staging_err = |source| SyncError::Staging {
        dest: dest.to_path_buf(),
        source,
    };

    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let prefix = format!(
        ".{}-",
        dest.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let existing = match fs::metadata(dest) {
        Ok(meta) => Some(meta),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => return Err(io_err(dest, err)),
    };

    let mut builder = Builder::new();
    builder.prefix(&prefix);
    if existing.is_none() {
        creation_mode(&mut builder);
    }
    let mut file = builder.tempfile_in(dir).map_err(staging_err)?;
    tracing::debug!("created staging file {}", file.path().display());

    file.write_all(content)
        .and_then(|()| file.flush())
        .map_err(staging_err)?;

    if let Some(meta) = &existing {
        tracing::debug!("copying file permissions and owner from destination");
        file.as_file()
            .set_permissions(meta.permissions())
            .map_err(staging_err)?;
        copy_owner(file.as_file(), meta).map_err(staging_err)?;
    }

    Ok(file.into_temp_path())
}

/// Let the umask decide, as for any newly created file.
#[cfg(unix)]
fn creation_mode(builder: &mut Builder<'_, '_>) {
    use std::os::unix::fs::PermissionsExt;
    builder.permissions(fs::Permissions::from_mode(0o666));
}

#[cfg(not(unix))]
fn creation_mode(_builder: &mut Builder<'_, '_>) {}

#[cfg(unix)]
fn copy_owner(file: &fs::File, meta: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::MetadataExt;
    std::os::unix::fs::fchown(file, Some(meta.uid()), Some(meta.gid()))
}

#[cfg(not(unix))]
fn copy_owner(_file: &fs::File, _meta: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

/// Rename errors that mean "different mount", e.g. a bind-mounted file.
fn is_cross_device(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::CrossesDevices | ErrorKind::ResourceBusy
    )
}

fn replace_destination(staging: &Path, dest: &Path, rename: RenameFn) -> Result<(), SyncError> {
    match rename(staging, dest) {
        Ok(()) => Ok(()),
        Err(err) if is_cross_device(&err) => {
            tracing::debug!("failed to rename staging file: {}; copying instead", err);
            copy_fallback(staging, dest).map_err(|source| SyncError::Fallback {
                dest: dest.to_path_buf(),
                source,
            })
        }
        Err(err) => Err(io_err(dest, err)),
    }
}

/// Overwrite `dest` in place with the staged bytes, mode, and owner.
fn copy_fallback(staging: &Path, dest: &Path) -> io::Result<()> {
    let content = fs::read(staging)?;
    let meta = fs::metadata(staging)?;
    fs::write(dest, content)?;
    fs::set_permissions(dest, meta.permissions())?;
    set_owner(dest, &meta)
}

#[cfg(unix)]
fn set_owner(path: &Path, meta: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::MetadataExt;
    std::os::unix::fs::chown(path, Some(meta.uid()), Some(meta.gid()))
}

#[cfg(not(unix))]
fn set_owner(_path: &Path, _meta: &fs::Metadata) -> io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingRunner;
    use filetime::FileTime;
    use std::os::unix::fs::{MetadataExt, PermissionsExt};
    use tempfile::TempDir;

    fn job(dest: &Path) -> TemplateJob {
        TemplateJob {
            src: PathBuf::from("unused.tera"),
            dest: Some(dest.to_path_buf()),
            ..Default::default()
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn cross_device(_: &Path, _: &Path) -> io::Result<()> {
        Err(io::Error::from(ErrorKind::CrossesDevices))
    }

    fn permission_denied(_: &Path, _: &Path) -> io::Result<()> {
        Err(io::Error::from(ErrorKind::PermissionDenied))
    }

    #[test]
    fn first_publish_returns_written() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("haproxy.cfg");
        let publisher = Publisher::new(RecordingRunner::new());
        let result = publisher.publish(&job(&dest), b"hello").unwrap();
        assert_eq!(result, WriteResult::Written { path: dest.clone() });
        assert_eq!(fs::read(&dest).unwrap(), b"hello");
    }

    #[test]
    fn second_publish_same_content_touches_nothing() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("haproxy.cfg");
        let mut j = job(&dest);
        j.notify_cmd = Some("reload".into());
        let publisher = Publisher::new(RecordingRunner::new());

        publisher.publish(&j, b"same").unwrap();
        let old = FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&dest, old).unwrap();
        let ino_1 = fs::metadata(&dest).unwrap().ino();

        let result = publisher.publish(&j, b"same").unwrap();
        assert!(matches!(result, WriteResult::Unchanged { .. }));

        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta),
            old,
            "file was rewritten"
        );
        assert_eq!(meta.ino(), ino_1, "file was replaced");
        assert_eq!(publisher.runner().commands(), ["reload"], "notify ran twice");
        assert_eq!(entries(tmp.path()), ["haproxy.cfg"]);
    }

    #[test]
    fn no_destination_prints_and_skips_hooks() {
        let j = TemplateJob {
            src: PathBuf::from("x.tera"),
            dest: None,
            check_cmd: Some("check {{staging}}".into()),
            notify_cmd: Some("reload".into()),
            notify_output: true,
        };
        let publisher = Publisher::new(RecordingRunner::new());
        let mut out = Vec::new();
        let result = publisher.publish_to(&j, b"to stdout", &mut out).unwrap();
        assert_eq!(result, WriteResult::Printed);
        assert_eq!(out, b"to stdout");
        assert!(publisher.runner().commands().is_empty());
    }

    #[test]
    fn existing_mode_is_preserved() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("secret.cfg");
        fs::write(&dest, "old").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();
        let before = fs::metadata(&dest).unwrap();

        Publisher::new(RecordingRunner::new())
            .publish(&job(&dest), b"new")
            .unwrap();

        let after = fs::metadata(&dest).unwrap();
        assert_eq!(after.permissions().mode() & 0o7777, 0o640);
        assert_eq!((after.uid(), after.gid()), (before.uid(), before.gid()));
        assert_eq!(fs::read(&dest).unwrap(), b"new");
    }

    #[test]
    fn new_destination_gets_default_creation_mode() {
        let tmp = TempDir::new().unwrap();
        let reference = tmp.path().join("reference");
        fs::write(&reference, "").unwrap();
        let dest = tmp.path().join("fresh.cfg");

        Publisher::new(RecordingRunner::new())
            .publish(&job(&dest), b"new")
            .unwrap();

        let expected = fs::metadata(&reference).unwrap().permissions().mode() & 0o7777;
        let actual = fs::metadata(&dest).unwrap().permissions().mode() & 0o7777;
        assert_eq!(actual, expected);
    }

    #[test]
    fn check_receives_absolute_staging_path() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("nginx.conf");
        let mut j = job(&dest);
        j.check_cmd = Some("nginx -t -c {{staging}}".into());
        let publisher = Publisher::new(RecordingRunner::new());
        publisher.publish(&j, b"conf").unwrap();

        let commands = publisher.runner().commands();
        assert_eq!(commands.len(), 1);
        let staged = commands[0]
            .strip_prefix("nginx -t -c ")
            .expect("placeholder replaced");
        let staged = Path::new(staged);
        assert!(staged.is_absolute());
        assert_eq!(staged.parent(), Some(tmp.path()));
        assert!(staged
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(".nginx.conf-"));
        assert!(!staged.exists(), "staging file must be removed");
    }

    #[test]
    fn failed_check_blocks_publish() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("haproxy.cfg");
        fs::write(&dest, "before").unwrap();
        let mut j = job(&dest);
        j.check_cmd = Some("haproxy -c -f {{staging}}".into());
        j.notify_cmd = Some("sv reload haproxy".into());
        let publisher = Publisher::new(RecordingRunner::new().fail_when("haproxy -c"));

        let err = publisher.publish(&j, b"after").unwrap_err();
        assert!(matches!(err, SyncError::CheckFailed { .. }), "got: {err}");
        assert!(err.to_string().contains("haproxy -c -f /"));

        assert_eq!(fs::read(&dest).unwrap(), b"before");
        assert_eq!(entries(tmp.path()), ["haproxy.cfg"], "staging leaked");
        assert!(publisher
            .runner()
            .commands()
            .iter()
            .all(|c| !c.contains("reload")));
    }

    #[test]
    fn notify_runs_after_write_and_failure_is_reported() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.cfg");
        let mut j = job(&dest);
        j.notify_cmd = Some("reload-a".into());
        let publisher = Publisher::new(RecordingRunner::new().fail_when("reload-a"));

        let err = publisher.publish(&j, b"v1").unwrap_err();
        assert!(matches!(err, SyncError::NotifyFailed { .. }), "got: {err}");
        assert_eq!(fs::read(&dest).unwrap(), b"v1", "write precedes notify");
    }

    #[test]
    fn cross_device_rename_falls_back_to_copy() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("mounted.cfg");
        fs::write(&dest, "old").unwrap();
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o640)).unwrap();
        let before = fs::metadata(&dest).unwrap();

        let publisher = Publisher::new(RecordingRunner::new()).with_rename(cross_device);
        let result = publisher.publish(&job(&dest), b"rendered bytes").unwrap();

        assert!(matches!(result, WriteResult::Written { .. }));
        assert_eq!(fs::read(&dest).unwrap(), b"rendered bytes");
        let after = fs::metadata(&dest).unwrap();
        assert_eq!(after.ino(), before.ino(), "fallback writes in place");
        assert_eq!((after.uid(), after.gid()), (before.uid(), before.gid()));
        assert_eq!(after.permissions().mode() & 0o7777, 0o640);
        assert_eq!(entries(tmp.path()), ["mounted.cfg"], "staging leaked");
    }

    #[test]
    fn other_rename_errors_fail_and_clean_up() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("locked.cfg");
        fs::write(&dest, "original").unwrap();

        let publisher = Publisher::new(RecordingRunner::new()).with_rename(permission_denied);
        let err = publisher.publish(&job(&dest), b"new").unwrap_err();

        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
        assert_eq!(fs::read(&dest).unwrap(), b"original");
        assert_eq!(entries(tmp.path()), ["locked.cfg"]);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("nope.cfg");
        let mut j = job(&dest);
        j.notify_cmd = Some("reload".into());
        let publisher = Publisher::new(RecordingRunner::new()).dry_run(true);

        let result = publisher.publish(&j, b"content").unwrap();
        assert!(matches!(result, WriteResult::WouldWrite { .. }));
        assert!(!dest.exists(), "dry-run must not create files");
        assert!(publisher.runner().commands().is_empty());
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("etc").join("haproxy").join("haproxy.cfg");
        Publisher::new(RecordingRunner::new())
            .publish(&job(&dest), b"x")
            .unwrap();
        assert!(dest.exists());
    }
}
