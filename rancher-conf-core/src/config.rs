//! YAML configuration file.
//!
//! ```yaml
//! metadata-url: http://rancher-metadata
//! metadata-version: "2016-07-29"
//! interval: 5
//! onetime: false
//! log-level: info
//! templates:
//!   - src: /etc/rancher-conf/haproxy.cfg.tera
//!     dest: /etc/haproxy/haproxy.cfg
//!     check-cmd: haproxy -c -f {{staging}}
//!     notify-cmd: sv reload haproxy
//!     notify-output: true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Placeholder in a check command replaced by the staging file path.
pub const STAGING_PLACEHOLDER: &str = "{{staging}}";

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rancher-conf/config.yaml";

/// One template job: render `src`, publish to `dest`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TemplateJob {
    pub src: PathBuf,
    /// `None` prints the rendered output to stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_cmd: Option<String>,
    /// Log notify command output even when it succeeds.
    #[serde(default)]
    pub notify_output: bool,
}

/// Process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub metadata_url: String,
    pub metadata_version: String,
    /// Poll interval in seconds.
    pub interval: u64,
    pub onetime: bool,
    pub log_level: String,
    pub templates: Vec<TemplateJob>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metadata_url: "http://rancher-metadata".to_string(),
            metadata_version: "latest".to_string(),
            interval: 5,
            onetime: false,
            log_level: "info".to_string(),
            templates: Vec::new(),
        }
    }
}

impl Config {
    /// Reject values the poll loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::Invalid(
                "interval must be at least 1 second".to_string(),
            ));
        }
        if self.templates.is_empty() {
            return Err(ConfigError::Invalid("no templates configured".to_string()));
        }
        if let Some(pos) = self
            .templates
            .iter()
            .position(|t| t.src.as_os_str().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "template #{} has an empty src",
                pos + 1
            )));
        }
        Ok(())
    }

    /// Metadata base URL with the protocol version appended as a path segment.
    pub fn metadata_endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.metadata_url.trim_end_matches('/'),
            self.metadata_version.trim_matches('/')
        )
    }
}

/// Load the configuration at `path`.
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
