//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// TaskGate - bounded-concurrency task scheduler
#[derive(Parser)]
#[command(
    name = "tg",
    about = "Run work through a bounded-concurrency scheduler with priorities and retries",
    version,
    after_help = generate_after_help(),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run synthetic tasks through the scheduler and report the outcome
    Simulate(SimulateArgs),

    /// Print the effective configuration
    Config,
}

/// Arguments for `tg simulate`
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Number of tasks to submit
    #[arg(short = 'n', long, default_value = "10")]
    pub tasks: usize,

    /// Concurrency ceiling (overrides config)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Retries per task (overrides config)
    #[arg(short, long)]
    pub retries: Option<u32>,

    /// Delay between attempts in milliseconds (overrides config)
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Probability that any single attempt fails
    #[arg(short, long, default_value = "0.2")]
    pub fail_rate: f64,

    /// Shortest simulated attempt in milliseconds
    #[arg(long, default_value = "20")]
    pub min_ms: u64,

    /// Longest simulated attempt in milliseconds
    #[arg(long, default_value = "200")]
    pub max_ms: u64,

    /// Priorities assigned to tasks in turn, e.g. "0,0,5"
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub priorities: Vec<i32>,

    /// Zero-based task indices to cancel before the run starts
    #[arg(long, value_delimiter = ',')]
    pub cancel: Vec<usize>,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for simulation results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text or json", s))
            }
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskgate")
        .join("logs")
        .join("taskgate.log")
}

/// Build the help footer showing where logs go
pub fn generate_after_help() -> String {
    format!("Logs are written to: {}\n", get_log_path().display())
}
