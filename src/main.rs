//! Scenario Engine - run HTTP test scenarios from suite files
//!
//! ## Usage
//!
//! ```bash
//! # Run every scenario of a suite
//! scenario-engine run --suite suite.yaml
//!
//! # Run the smoke group, only scenarios tagged web and fast
//! scenario-engine run --suite suite.yaml --group smoke --tag web --tag fast
//!
//! # Override env data and write a JSON report
//! scenario-engine run --env host=localhost:8080 --format json --output report.json
//!
//! # List scenarios
//! scenario-engine list --suite suite.yaml --detailed
//!
//! # Create a configuration file
//! scenario-engine config init
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{debug, info};

mod cli;

use cli::Args;
use scenario_engine::config::{print_env_help, AppConfig, ConfigFile, EnvConfig};
use scenario_engine::context::{Data, ExecutionContext};
use scenario_engine::output::{write_reports_to_file, ResultFormatter};
use scenario_engine::repository::Repository;
use scenario_engine::suite::SuiteFile;
use scenario_engine::utils::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_config = EnvConfig::load();
    let mut config = load_config(args.config.as_deref(), &env_config)?;
    env_config.apply(&mut config);
    if args.verbose {
        config.log_level = "debug".to_string();
    }

    init_logger(config.log_level());
    debug!("Effective configuration: {:?}", config);

    match args.command {
        cli::Command::Run(run_args) => {
            let all_passed = run_suite(run_args, config).await?;
            if !all_passed {
                std::process::exit(1);
            }
        }
        cli::Command::List(list_args) => {
            list_scenarios(list_args, &config)?;
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, &config)?;
        }
    }

    Ok(())
}

/// Load the configuration file named on the command line, by the
/// environment, or found in the standard locations
fn load_config(path: Option<&str>, env_config: &EnvConfig) -> Result<AppConfig> {
    let file = match path.or(env_config.config_file.as_deref()) {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::load_default()?,
    };
    Ok(file.app)
}

fn load_suite(suite: Option<String>, config: &AppConfig) -> Result<SuiteFile> {
    let path = suite
        .or_else(|| config.suite.clone())
        .context("No suite file given. Use --suite or set SCENARIO_ENGINE_SUITE")?;
    SuiteFile::load(&path)
}

async fn run_suite(args: cli::RunArgs, mut config: AppConfig) -> Result<bool> {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(retries) = args.retries {
        config.max_retries = retries;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(format) = &args.format {
        config.format = format.clone();
    }
    config.validate()?;
    let format = config.output_format();

    let suite = load_suite(args.suite, &config)?;
    let extra_env: Data = args.env.into_iter().collect();
    let mut repository = suite.into_repository(&config, extra_env)?;

    let tags = args.filter.tag_patterns();
    info!(
        "Running scenarios (group={:?}, name={:?}, tags={:?})",
        args.filter.group, args.filter.name, tags
    );
    repository
        .run_scenarios(&args.filter.group, &args.filter.name, &tags)
        .await;

    let reports = repository.reports();
    if reports.is_empty() {
        println!("No scenarios matched.");
    }

    let formatter = ResultFormatter::new(format);
    println!("{}", formatter.format_reports(&reports)?);

    if let Some(output) = &args.output {
        write_reports_to_file(output, &reports, format)?;
        println!("Report saved to: {output}");
    }

    Ok(reports.iter().all(|r| r.is_all_passed()))
}

fn list_scenarios(args: cli::ListArgs, config: &AppConfig) -> Result<()> {
    let suite = load_suite(args.suite, config)?;
    let repository: Repository = suite.into_repository(config, Data::new())?;
    let tags = args.filter.tag_patterns();

    println!(
        "{:<24} {:<16} {:>7}  Tags",
        "Scenario", "Group", "Workers"
    );
    println!("{:-<64}", "");

    let describe_ctx = ExecutionContext::with_env(config.env.clone()).derive(Data::new());
    let mut count = 0;
    for entry in repository.matching(&args.filter.group, &args.filter.name, &tags) {
        count += 1;
        println!(
            "{:<24} {:<16} {:>7}  {}",
            entry.scenario.name,
            entry.group,
            entry.concurrency.max(1),
            entry.tags.join(", ")
        );
        if args.detailed {
            println!("    {}", entry.scenario.step.describe(&describe_ctx));
        }
    }

    println!("\n{} of {} scenarios", count, repository.entries().len());
    Ok(())
}

fn manage_config(args: cli::ConfigArgs, config: &AppConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            let path = Path::new(&output);
            if path.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {output}. Use --force to overwrite."
                );
            }

            ConfigFile::example().save(path)?;
            println!("✓ Configuration file created: {output}");
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env, format } => {
            if env {
                EnvConfig::load().print_summary();
                println!();
                print_env_help();
            } else {
                let effective = ConfigFile {
                    app: config.clone(),
                    ..ConfigFile::default()
                };
                let output = if format == "json" {
                    serde_json::to_string_pretty(&effective)?
                } else {
                    serde_yaml::to_string(&effective)?
                };
                println!("{output}");
            }
        }
    }

    Ok(())
}
