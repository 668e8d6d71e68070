use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use pgm_cli::{Cli, Commands, PgmConfig, Session};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

/// RUST_LOG wins, then `--log-level`, then `[logging] level`.
fn init_logging(cli: &Cli, config: &PgmConfig) {
    let level = cli
        .log_level
        .map(|level| level.to_string().to_lowercase())
        .unwrap_or_else(|| config.logging.level.clone());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli, config: PgmConfig) -> Result<()> {
    if let Commands::Completions { shell, out } = &cli.command {
        return commands::completions::handle(*shell, out.as_deref());
    }

    let session = Session::new(config, cli.meta.as_deref())?;
    debug!(command = ?cli.command, "running command");
    match &cli.command {
        Commands::Validate {
            input,
            dataset_type,
            batch,
            single,
        } => commands::validate::handle(&session, input, *dataset_type, *batch, *single),
        Commands::Inspect {
            input,
            dataset_type,
            format,
        } => commands::inspect::handle(&session, input, *dataset_type, *format),
        Commands::Convert {
            input,
            dataset_type,
            to,
            slots_from,
            output,
        } => commands::convert::handle(
            &session,
            input,
            *dataset_type,
            *to,
            slots_from.as_deref(),
            output,
        ),
        Commands::Filter {
            input,
            dataset_type,
            components,
            relevant,
            output,
        } => commands::filter::handle(
            &session,
            input,
            *dataset_type,
            components,
            *relevant,
            output,
        ),
        Commands::Options { format } => commands::options::handle(&session, *format),
        Commands::Completions { .. } => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PgmConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(&cli, &config);

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
