use clap::Parser;
use colored::*;
use kmatrix::cli::{Cli, Commands};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG, then KMATRIX_LOG, then -v
    let log_level = std::env::var("KMATRIX_LOG").unwrap_or_else(|_| cli.log_level().to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        let exit_code = match e.downcast_ref::<kmatrix::KmatrixError>() {
            Some(kmatrix::KmatrixError::Config(_)) => 2,
            Some(kmatrix::KmatrixError::Io(_)) => 3,
            Some(kmatrix::KmatrixError::Parse(_))
            | Some(kmatrix::KmatrixError::Engine(_))
            | Some(kmatrix::KmatrixError::Sampling(_)) => 4,
            Some(kmatrix::KmatrixError::ExternalProcess { .. }) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let globals = cli.globals();
    match cli.command {
        Commands::Run(args) => kmatrix::cli::commands::run::run(args, globals),
        Commands::Config(args) => kmatrix::cli::commands::config::run(args),
    }
}
