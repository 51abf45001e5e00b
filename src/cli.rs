//! Command-line interface for rowaudit

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rowaudit")]
#[command(about = "Hash-based row-level change audit for relational databases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the tables an audit would cover
    ListTables {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Audit the target database and record changed rows
    Audit {
        /// Persist run history when greater than 0
        #[arg(long, default_value = "0")]
        history: u32,

        /// Tables scanned concurrently (overrides config)
        #[arg(long, value_parser = validate_workers)]
        workers: Option<usize>,

        /// Per-table scan timeout in seconds (overrides config)
        #[arg(long, value_parser = validate_timeout)]
        table_timeout: Option<u64>,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },

    /// Show the effective configuration
    Config {
        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,
    },
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

/// Validate that the worker count is greater than 0
fn validate_workers(s: &str) -> Result<usize, String> {
    let workers: usize = s
        .parse()
        .map_err(|_| format!("Invalid worker count: '{}'. Must be a positive integer.", s))?;

    if workers == 0 {
        return Err("Worker count must be greater than 0".to_string());
    }

    Ok(workers)
}

fn validate_timeout(s: &str) -> Result<u64, String> {
    let seconds: u64 = s
        .parse()
        .map_err(|_| format!("Invalid timeout: '{}'. Must be a positive number of seconds.", s))?;

    if seconds == 0 {
        return Err("Timeout must be greater than 0".to_string());
    }

    Ok(seconds)
}
