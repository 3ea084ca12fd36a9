//! `rancher-conf diff`: show unified diffs for what `run` would write.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use rancher_conf_core::Context as Topology;
use rancher_conf_daemon::HttpMetadataClient;
use rancher_conf_renderer::Renderer;
use rancher_conf_sync::diff_destination;

use super::ConfigArgs;

/// Arguments for `rancher-conf diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        config.validate().context("invalid configuration")?;
        rancher_conf_daemon::init_tracing(&config.log_level);

        let endpoint = config.metadata_endpoint();
        let client = HttpMetadataClient::new(endpoint.as_str());
        let ctx = Topology::fetch(&client)
            .with_context(|| format!("could not read metadata from {endpoint}"))?;
        let renderer = Renderer::new(&ctx).context("could not build template context")?;

        let mut changed = 0;
        for job in &config.templates {
            let Some(dest) = &job.dest else {
                tracing::debug!(src = %job.src.display(), "no destination, skipping");
                continue;
            };
            let rendered = renderer
                .render_file(&job.src)
                .with_context(|| format!("could not render '{}'", job.src.display()))?;
            let Some(diff) = diff_destination(dest, &rendered)
                .with_context(|| format!("could not diff '{}'", dest.display()))?
            else {
                continue;
            };
            changed += 1;
            print_colored(&diff.unified_diff);
        }

        if changed == 0 {
            println!("No differences.");
        }
        Ok(())
    }
}

fn print_colored(unified: &str) {
    for line in unified.lines() {
        let line = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("@@") {
            line.cyan()
        } else {
            line.normal()
        };
        println!("{line}");
    }
}
