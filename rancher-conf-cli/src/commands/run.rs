//! `rancher-conf run`: the poll loop.

use anyhow::{Context, Result};
use clap::Args;

use super::ConfigArgs;

/// Arguments for `rancher-conf run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Poll interval in seconds.
    #[arg(long, short = 'i')]
    pub interval: Option<u64>,

    /// Process every template once and exit.
    #[arg(long)]
    pub onetime: bool,

    /// Report what would change without staging, checking, writing or notifying.
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn run(self) -> Result<()> {
        let mut config = self.config.load()?;
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if self.onetime {
            config.onetime = true;
        }
        config.validate().context("refusing to start")?;

        rancher_conf_daemon::start_blocking(config, self.dry_run).context("rancher-conf failed")
    }
}
