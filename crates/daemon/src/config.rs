//! Daemon configuration
//!
//! Layers, lowest priority first: built-in defaults, the TOML file named by
//! `VERBA_CONFIG` (default `~/.verba/verba.toml`, optional), then `VERBA_*`
//! environment variables with `__` between sections (`VERBA_POOL__WORKERS=4`).

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use verba_api_rpc::RpcServerConfig;
use verba_api_sse::HttpServerConfig;
use verba_core::application::worker::constants::{DEFAULT_POLL_INTERVAL, DEFAULT_SHUTDOWN_GRACE};
use verba_core::application::PoolConfig;
use verba_core::domain::{JobKind, DEFAULT_LOG_CAPACITY};
use verba_infra_system::PipelineCommand;

pub const CONFIG_PATH_ENV: &str = "VERBA_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "~/.verba/verba.toml";
const DEFAULT_OUTPUT_DIR: &str = "~/.verba/output";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    pub log_capacity: usize,
    pub poll_interval_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_LOG_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub rpc: RpcServerConfig,
    #[serde(default)]
    pub http: HttpServerConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub pipelines: HashMap<String, PipelineCommand>,
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

impl DaemonConfig {
    /// Load from the default file location and the process environment
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let path = shellexpand::tilde(&path).into_owned();

        let config = Config::builder()
            .add_source(File::new(&path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("VERBA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration (file: {path})"))?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }

    /// Parse a TOML document without touching the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .context("Failed to parse configuration")?
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.output_dir).into_owned())
    }

    /// Pipelines keyed by job kind; unknown kind names are an error
    pub fn pipeline_map(&self) -> Result<HashMap<JobKind, PipelineCommand>> {
        self.pipelines
            .iter()
            .map(|(name, command)| {
                let kind: JobKind = name
                    .parse()
                    .with_context(|| format!("Unknown job kind in [pipelines.{name}]"))?;
                Ok((kind, command.clone()))
            })
            .collect()
    }
}
