//! Environment configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use meshform_reconcile::{DEFAULT_ACCOUNT_ID, DEFAULT_PARTITION, DEFAULT_REGION};

/// Sandbox state file name inside the data directory.
const SANDBOX_FILE: &str = "sandbox.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{other}' (expected text or json)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub log_format: LogFormat,

    /// Sandbox remote state file.
    pub state_path: PathBuf,

    /// Location used for generated ARNs.
    pub partition: String,
    pub region: String,
    pub account_id: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let log_level = lookup("MESHCTL_LOG_LEVEL").unwrap_or_else(|| "warn".to_string());

        let log_format = lookup("MESHCTL_LOG_FORMAT")
            .map(|v| v.parse())
            .transpose()
            .context("invalid MESHCTL_LOG_FORMAT")?
            .unwrap_or(LogFormat::Text);

        let state_path = match lookup("MESHCTL_STATE") {
            Some(path) => PathBuf::from(path),
            None => default_state_path()?,
        };

        let partition =
            lookup("MESHCTL_PARTITION").unwrap_or_else(|| DEFAULT_PARTITION.to_string());
        let region = lookup("MESHCTL_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string());
        let account_id =
            lookup("MESHCTL_ACCOUNT_ID").unwrap_or_else(|| DEFAULT_ACCOUNT_ID.to_string());

        Ok(Self {
            log_level,
            log_format,
            state_path,
            partition,
            region,
            account_id,
        })
    }
}

fn default_state_path() -> Result<PathBuf> {
    ProjectDirs::from("com", "meshform", "meshctl")
        .map(|dirs| dirs.data_dir().join(SANDBOX_FILE))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory; set MESHCTL_STATE"))
}
