use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use rancher_conf_core::{Config, Context, MetadataSource, TemplateJob};
use rancher_conf_renderer::Renderer;
use rancher_conf_sync::{CommandRunner, Publisher, ShellRunner, WriteResult};

use crate::client::HttpMetadataClient;
use crate::error::{io_err, DaemonError};

/// Pause after a metadata or graph-building failure before the next wait.
pub const TRANSIENT_DELAY: Duration = Duration::from_secs(2);

/// Pause between attempts while the metadata service is unreachable.
pub const CONNECT_RETRY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Printed,
    Written,
    Unchanged,
    WouldWrite,
    Failed { error: String },
}

impl From<&WriteResult> for OutcomeStatus {
    fn from(result: &WriteResult) -> Self {
        match result {
            WriteResult::Printed => OutcomeStatus::Printed,
            WriteResult::Written { .. } => OutcomeStatus::Written,
            WriteResult::Unchanged { .. } => OutcomeStatus::Unchanged,
            WriteResult::WouldWrite { .. } => OutcomeStatus::WouldWrite,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub src: PathBuf,
    pub dest: Option<PathBuf>,
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Everything one processed metadata version produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<PublishOutcome>,
}

impl CycleReport {
    fn new(version: String) -> Self {
        Self {
            version,
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    fn count(&self, wanted: fn(&OutcomeStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| wanted(&o.status)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Written | OutcomeStatus::WouldWrite))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Unchanged))
    }

    pub fn printed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Printed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, OutcomeStatus::Failed { .. }))
    }

    fn log(&self, onetime: bool) {
        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
        let message = if onetime {
            "all templates processed, exiting"
        } else {
            "all templates processed, waiting for changes in metadata"
        };
        tracing::info!(
            version = %self.version,
            written = self.written(),
            unchanged = self.unchanged(),
            printed = self.printed(),
            failed = self.failed(),
            elapsed_ms,
            "{message}"
        );
    }
}

/// The poll loop: owns the last committed metadata version.
pub struct Runner<S, R> {
    config: Config,
    source: S,
    publisher: Publisher<R>,
    /// `None` until the first build, so the first cycle always runs.
    last_version: Option<String>,
}

impl<S: MetadataSource, R: CommandRunner> Runner<S, R> {
    pub fn new(config: Config, source: S, runner: R) -> Self {
        Self {
            config,
            source,
            publisher: Publisher::new(runner),
            last_version: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.publisher = self.publisher.dry_run(dry_run);
        self
    }

    pub fn last_version(&self) -> Option<&str> {
        self.last_version.as_deref()
    }

    /// Run one cycle. Returns `None` when the metadata version is unchanged.
    ///
    /// A new version is committed before the context is rebuilt: a failed
    /// build or job is not retried until the version changes again.
    /// In continuous mode the first failing job ends the cycle; one-shot
    /// mode records the failure and moves on to the next job.
    pub fn poll_once(&mut self) -> Result<Option<CycleReport>, DaemonError> {
        tracing::debug!("checking for metadata change");
        let version = self.source.get_version()?;
        if self.last_version.as_deref() == Some(version.as_str()) {
            tracing::debug!(%version, "no changes in metadata");
            return Ok(None);
        }
        tracing::debug!(
            old = self.last_version.as_deref().unwrap_or("-"),
            new = %version,
            "metadata version changed"
        );

        self.last_version = Some(version.clone());
        let ctx = Context::fetch(&self.source)?;
        let renderer = Renderer::new(&ctx)?;

        let mut report = CycleReport::new(version);
        for job in &self.config.templates {
            let status = match self.process_job(&renderer, job) {
                Ok(result) => OutcomeStatus::from(&result),
                Err(err) if err.is_fatal() || !self.config.onetime => return Err(err),
                Err(err) => {
                    tracing::error!(src = %job.src.display(), error = %err, "template job failed");
                    OutcomeStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            report.outcomes.push(PublishOutcome {
                src: job.src.clone(),
                dest: job.dest.clone(),
                status,
            });
        }
        report.log(self.config.onetime);
        Ok(Some(report))
    }

    fn process_job(&self, renderer: &Renderer, job: &TemplateJob) -> Result<WriteResult, DaemonError> {
        tracing::debug!(
            src = %job.src.display(),
            dest = ?job.dest,
            "processing template"
        );
        let content = renderer.render_file(&job.src)?;
        Ok(self.publisher.publish(job, &content)?)
    }

    /// Drive the loop until `shutdown` fires, or once in one-shot mode.
    ///
    /// Shutdown is only observed while waiting for the next tick.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<(), DaemonError> {
        if self.config.onetime {
            tracing::info!("processing all templates once");
            let total = self.config.templates.len();
            return match self.poll_once() {
                Ok(Some(report)) if report.failed() > 0 => Err(DaemonError::JobsFailed {
                    failed: report.failed(),
                    total,
                }),
                Ok(_) => Ok(()),
                Err(err) => {
                    settle(&err).await;
                    Err(err)
                }
            };
        }

        tracing::info!(
            interval_secs = self.config.interval,
            "polling metadata"
        );
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            match self.poll_once() {
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    tracing::error!(error = %err, "cycle failed");
                    settle(&err).await;
                }
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested, stopping poll loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Pause for [`TRANSIENT_DELAY`] after a metadata or build failure, in both
/// one-shot and continuous mode.
async fn settle(err: &DaemonError) {
    if err.is_transient() {
        tokio::time::sleep(TRANSIENT_DELAY).await;
    }
}

/// Connect to the metadata service and run the loop until a signal arrives.
pub fn start_blocking(config: Config, dry_run: bool) -> Result<(), DaemonError> {
    init_tracing(&config.log_level);

    let endpoint = config.metadata_endpoint();
    tracing::info!(
        version = %config.metadata_version,
        "initializing rancher metadata client"
    );
    let client = HttpMetadataClient::connect_and_wait(endpoint, CONNECT_RETRY);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    let mut runner = Runner::new(config, client, ShellRunner).dry_run(dry_run);
    runtime.block_on(run_until_signal(&mut runner))
}

/// Run `runner` with SIGINT, SIGTERM and SIGQUIT wired to shutdown.
pub async fn run_until_signal<S, R>(runner: &mut Runner<S, R>) -> Result<(), DaemonError>
where
    S: MetadataSource,
    R: CommandRunner,
{
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let signals = tokio::spawn(async move {
        let signal = wait_for_signal().await?;
        tracing::info!(signal, "exit requested by signal");
        let _ = shutdown_tx.send(());
        Ok::<(), DaemonError>(())
    });

    let result = runner.run(shutdown_rx).await;
    if signals.is_finished() {
        handle_join(signals.await)?;
    } else {
        signals.abort();
    }
    result
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    use tokio::signal::unix::{signal, SignalKind};

    let install = |kind| signal(kind).map_err(|e| DaemonError::Signal(e.to_string()));
    let mut terminate = install(SignalKind::terminate())?;
    let mut quit = install(SignalKind::quit())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.map_err(|e| DaemonError::Signal(e.to_string()))?;
            Ok("SIGINT")
        }
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = quit.recv() => Ok("SIGQUIT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<&'static str, DaemonError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| DaemonError::Signal(e.to_string()))?;
    Ok("ctrl-c")
}

fn handle_join(
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Signal(format!(
            "signal task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_tracing(level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
