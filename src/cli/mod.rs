//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Integration test scenario runner
#[derive(Parser, Debug)]
#[command(name = "scenario-engine")]
#[command(version)]
#[command(about = "Run HTTP test scenarios concurrently with retries")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the scenarios of a suite
    Run(RunArgs),

    /// List the scenarios of a suite
    List(ListArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Scenario selection; every pattern is a regular expression
#[derive(Parser, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Group pattern
    #[arg(short, long, default_value = "")]
    pub group: String,

    /// Scenario name pattern
    #[arg(short, long, default_value = "")]
    pub name: String,

    /// Tag pattern; repeat to require several tags
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,
}

impl FilterArgs {
    pub fn tag_patterns(&self) -> Vec<&str> {
        self.tags.iter().map(String::as_str).collect()
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Suite file (YAML or JSON)
    #[arg(short, long)]
    pub suite: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Extra env data as KEY=VALUE
    #[arg(short, long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Workers per scenario, overrides the suite default
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Retries per step run, overrides the suite default
    #[arg(long)]
    pub retries: Option<u32>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Save report to file
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Suite file (YAML or JSON)
    #[arg(short, long)]
    pub suite: Option<String>,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Show step details
    #[arg(short, long)]
    pub detailed: bool,
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "./scenario-engine.yaml")]
        output: String,

        /// Overwrite existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variable overrides instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
