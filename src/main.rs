//! Main entry point for rowaudit CLI

use clap::Parser;
use rowaudit::cli::Cli;
use rowaudit::commands::execute_command;

fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging, verbose raises the level to debug
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    // Execute the command
    if let Err(e) = execute_command(cli.command, cli.config.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
