//! Unit tests for CLI argument parsing and validation

use clap::Parser;
use rowaudit::cli::{Cli, Commands, OutputFormat};

#[test]
fn test_cli_audit_defaults() {
    let cli = Cli::try_parse_from(["rowaudit", "audit"]).unwrap();
    match cli.command {
        Commands::Audit {
            history,
            workers,
            table_timeout,
            no_progress,
            format,
        } => {
            assert_eq!(history, 0);
            assert_eq!(workers, None);
            assert_eq!(table_timeout, None);
            assert!(!no_progress);
            assert_eq!(format, "pretty");
        }
        _ => panic!("Expected Audit command"),
    }
    assert!(cli.config.is_none());
    assert!(!cli.verbose);
}

#[test]
fn test_cli_audit_with_options() {
    let cli = Cli::try_parse_from([
        "rowaudit",
        "audit",
        "--history",
        "1",
        "--workers",
        "4",
        "--table-timeout",
        "60",
        "--no-progress",
        "--format",
        "json",
    ])
    .unwrap();

    match cli.command {
        Commands::Audit {
            history,
            workers,
            table_timeout,
            no_progress,
            format,
        } => {
            assert_eq!(history, 1);
            assert_eq!(workers, Some(4));
            assert_eq!(table_timeout, Some(60));
            assert!(no_progress);
            assert_eq!(OutputFormat::parse(&format), Ok(OutputFormat::Json));
        }
        _ => panic!("Expected Audit command"),
    }
}

#[test]
fn test_cli_rejects_zero_workers() {
    assert!(Cli::try_parse_from(["rowaudit", "audit", "--workers", "0"]).is_err());
    assert!(Cli::try_parse_from(["rowaudit", "audit", "--table-timeout", "0"]).is_err());
}

#[test]
fn test_cli_global_flags() {
    let cli = Cli::try_parse_from(["rowaudit", "list-tables", "--config", "other.json", "-v"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("other.json")));
    assert!(cli.verbose);
    assert!(matches!(cli.command, Commands::ListTables { .. }));
}

#[test]
fn test_cli_config_command() {
    let cli = Cli::try_parse_from(["rowaudit", "config", "--format", "json"]).unwrap();
    match cli.command {
        Commands::Config { format } => assert_eq!(format, "json"),
        _ => panic!("Expected Config command"),
    }
}

#[test]
fn test_cli_unknown_command() {
    assert!(Cli::try_parse_from(["rowaudit", "snapshot"]).is_err());
}
