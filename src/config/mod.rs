//! Configuration module
//!
//! Handles loading and managing configuration. Values come from a config
//! file, are overridden by `SCENARIO_ENGINE_*` environment variables and
//! finally by command line flags.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig, ENV_PREFIX};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::output::OutputFormat;
use crate::utils::LogLevel;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Workers per scenario when the suite does not set one
    pub concurrency: usize,

    /// Retries per step run when the suite does not set them
    pub max_retries: u32,

    /// Delay between two attempts in milliseconds
    pub retry_backoff_ms: u64,

    /// HTTP timeout in seconds
    pub timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Output format (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Default suite file
    pub suite: Option<String>,

    /// Environment data available to every scenario as `.Env`
    pub env: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_retries: 0,
            retry_backoff_ms: 1000,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            log_level: "info".to_string(),
            format: "table".to_string(),
            suite: None,
            env: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than 0");
        }
        if LogLevel::from_str(&self.log_level).is_none() {
            anyhow::bail!("Unknown log level: {}", self.log_level);
        }
        if OutputFormat::from_str(&self.format).is_none() {
            anyhow::bail!("Unknown output format: {}", self.format);
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn log_level(&self) -> LogLevel {
        LogLevel::from_str(&self.log_level).unwrap_or(LogLevel::Info)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat::from_str(&self.format).unwrap_or(OutputFormat::Table)
    }
}
