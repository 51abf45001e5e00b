//! Command implementations for rowaudit CLI

use crate::auditor::{tables_to_audit, Auditor, RunOptions};
use crate::cli::{Commands, OutputFormat};
use crate::config::Config;
use crate::connection::{open_source, Connections};
use crate::error::{AuditError, Result};
use crate::output::{JsonFormatter, PrettyPrinter};
use std::path::Path;
use std::time::Duration;

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::ListTables { format } => list_tables_command(config_path, &format),
        Commands::Audit {
            history,
            workers,
            table_timeout,
            no_progress,
            format,
        } => audit_command(config_path, history, workers, table_timeout, no_progress, &format),
        Commands::Config { format } => config_command(config_path, &format),
    }
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    Config::load(config_path)
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::parse(format).map_err(AuditError::config)
}

/// List the tables an audit would cover
fn list_tables_command(config_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = parse_format(format)?;
    let config = load_config(config_path)?;

    let source = open_source(&config.target, config.connect_retries)?;
    let tables = tables_to_audit(&config, source.as_ref())?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_table_list(&tables),
        OutputFormat::Json => println!("{}", JsonFormatter::format_table_list(&tables)?),
    }

    Ok(())
}

/// Run an audit against the configured target
fn audit_command(
    config_path: Option<&Path>,
    history: u32,
    workers: Option<usize>,
    table_timeout: Option<u64>,
    no_progress: bool,
    format: &str,
) -> Result<()> {
    let output_format = parse_format(format)?;
    let config = load_config(config_path)?;

    let mut options = RunOptions::from_config(&config);
    options.save_history = history > 0;
    options.show_progress = !no_progress;
    if let Some(workers) = workers {
        options.workers = workers;
    }
    if let Some(seconds) = table_timeout {
        options.table_timeout = Some(Duration::from_secs(seconds));
    }

    let Connections { mut audit, target } = Connections::connect(&config)?;

    if output_format == OutputFormat::Pretty {
        println!(
            "🔍 Auditing '{}' into '{}'...",
            config.target.connection_string, config.audit.connection_string
        );
    }

    let auditor = Auditor::new(&config, options);
    let summary = auditor.run(audit.as_mut(), target.as_ref())?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_summary(&summary),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&summary)?),
    }

    Ok(())
}

/// Show the effective configuration
fn config_command(config_path: Option<&Path>, format: &str) -> Result<()> {
    let output_format = parse_format(format)?;
    let config = load_config(config_path)?;

    match output_format {
        OutputFormat::Pretty => PrettyPrinter::print_config(&config),
        OutputFormat::Json => println!("{}", JsonFormatter::format(&config)?),
    }

    Ok(())
}
