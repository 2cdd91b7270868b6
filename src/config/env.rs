//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

use super::AppConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SCENARIO_ENGINE";

/// Overrides read from `SCENARIO_ENGINE_*` variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// Suite file from SCENARIO_ENGINE_SUITE
    pub suite: Option<String>,
    /// Config file from SCENARIO_ENGINE_CONFIG
    pub config_file: Option<String>,
    /// Concurrency from SCENARIO_ENGINE_CONCURRENCY
    pub concurrency: Option<usize>,
    /// Retries from SCENARIO_ENGINE_RETRIES
    pub max_retries: Option<u32>,
    /// Backoff from SCENARIO_ENGINE_BACKOFF_MS
    pub retry_backoff_ms: Option<u64>,
    /// Timeout from SCENARIO_ENGINE_TIMEOUT
    pub timeout: Option<u64>,
    /// Output format from SCENARIO_ENGINE_FORMAT
    pub format: Option<String>,
    /// Verbose from SCENARIO_ENGINE_VERBOSE
    pub verbose: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            suite: get_env("SUITE"),
            config_file: get_env("CONFIG"),
            concurrency: get_env_parse("CONCURRENCY"),
            max_retries: get_env_parse("RETRIES"),
            retry_backoff_ms: get_env_parse("BACKOFF_MS"),
            timeout: get_env_parse("TIMEOUT"),
            format: get_env("FORMAT"),
            verbose: get_env_bool("VERBOSE"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        *self != Self::default()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_SUITE:        {:?}", ENV_PREFIX, self.suite);
        println!("  {}_CONFIG:       {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_CONCURRENCY:  {:?}", ENV_PREFIX, self.concurrency);
        println!("  {}_RETRIES:      {:?}", ENV_PREFIX, self.max_retries);
        println!("  {}_BACKOFF_MS:   {:?}", ENV_PREFIX, self.retry_backoff_ms);
        println!("  {}_TIMEOUT:      {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_FORMAT:       {:?}", ENV_PREFIX, self.format);
        println!("  {}_VERBOSE:      {:?}", ENV_PREFIX, self.verbose);
    }

    /// Apply the overrides on top of `config`
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(suite) = &self.suite {
            config.suite = Some(suite.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(retries) = self.max_retries {
            config.max_retries = retries;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            config.retry_backoff_ms = backoff;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if self.verbose == Some(true) {
            config.log_level = "debug".to_string();
        }
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Print all SCENARIO_ENGINE environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_SUITE        Suite file to run");
    println!("  {ENV_PREFIX}_CONFIG       Path to configuration file");
    println!("  {ENV_PREFIX}_CONCURRENCY  Default workers per scenario");
    println!("  {ENV_PREFIX}_RETRIES      Default retries per step run");
    println!("  {ENV_PREFIX}_BACKOFF_MS   Delay between attempts in milliseconds");
    println!("  {ENV_PREFIX}_TIMEOUT      HTTP timeout in seconds");
    println!("  {ENV_PREFIX}_FORMAT       Output format (table, json, csv, summary)");
    println!("  {ENV_PREFIX}_VERBOSE      Enable debug logging (true/false)");
}
