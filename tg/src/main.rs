//! TaskGate - bounded-concurrency task scheduler
//!
//! CLI entry point for simulating workloads and inspecting configuration.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use taskgate::TaskEvent;
use taskgate::cli::{Cli, Command, OutputFormat, SimulateArgs, get_log_path};
use taskgate::config::Config;
use taskgate::simulate::{SimulationPlan, effective_config, run_simulation};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate(args) => cmd_simulate(&config, &args).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_simulate(config: &Config, args: &SimulateArgs) -> Result<()> {
    debug!(?args, "cmd_simulate: called");
    let scheduler_config = effective_config(&config.scheduler, args);
    let plan = SimulationPlan::from(args);

    match args.format {
        OutputFormat::Text => {
            println!(
                "Simulating {} tasks, {} at a time, {} retries, {}ms retry delay",
                plan.tasks.to_string().cyan(),
                scheduler_config.max_concurrent_tasks.to_string().cyan(),
                scheduler_config.retries.to_string().cyan(),
                scheduler_config.retry_delay_ms.to_string().cyan(),
            );
            let status = run_simulation(scheduler_config, &plan, print_event).await?;
            let stats = status.stats;
            println!();
            println!(
                "{} submitted, {} succeeded, {} failed, {} cancelled, {} retries, peak concurrency {}",
                stats.total_submitted,
                stats.total_succeeded.to_string().green(),
                stats.total_failed.to_string().red(),
                stats.total_cancelled.to_string().yellow(),
                stats.total_retries,
                stats.peak_concurrent,
            );
        }
        OutputFormat::Json => {
            let status = run_simulation(scheduler_config, &plan, |_: TaskEvent<u64>| {}).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn print_event(event: TaskEvent<u64>) {
    match event {
        TaskEvent::Loading { id, name } => {
            println!("{} {} {}", "queued   ".dimmed(), id.to_string().dimmed(), name);
        }
        TaskEvent::Running { id, name, attempt } => {
            println!("{} {} {} (attempt {})", "running  ".cyan(), id, name, attempt);
        }
        TaskEvent::Retrying {
            id,
            name,
            retries_left,
            delay,
            error,
            ..
        } => {
            println!(
                "{} {} {}: {} (retry in {:?}, {} left)",
                "retrying ".yellow(),
                id,
                name,
                error,
                delay,
                retries_left
            );
        }
        TaskEvent::Succeeded { id, name, value } => {
            println!("{} {} {} in {}ms", "✓ done   ".green(), id, name, value);
        }
        TaskEvent::Failed {
            id,
            name,
            attempts,
            error,
        } => {
            println!("{} {} {} after {} attempts: {}", "✗ failed ".red(), id, name, attempts, error);
        }
        TaskEvent::Cancelled { id, name } => {
            println!("{} {} {}", "cancelled".yellow(), id, name);
        }
    }
}
