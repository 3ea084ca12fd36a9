pub mod diff;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use rancher_conf_core::config::{self, DEFAULT_CONFIG_PATH};
use rancher_conf_core::Config;

/// Flags shared by every subcommand; each overrides the config file value.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Base URL of the Rancher metadata service.
    #[arg(long)]
    pub metadata_url: Option<String>,

    /// Metadata protocol version, e.g. `2016-07-29` or `latest`.
    #[arg(long)]
    pub metadata_version: Option<String>,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl ConfigArgs {
    /// Load the config file and apply flag overrides.
    pub fn load(&self) -> Result<Config> {
        let mut config = config::load_at(&self.config)
            .with_context(|| format!("could not load config '{}'", self.config.display()))?;
        if let Some(url) = &self.metadata_url {
            config.metadata_url = url.clone();
        }
        if let Some(version) = &self.metadata_version {
            config.metadata_version = version.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        Ok(config)
    }
}
