//! `dstu2` entry point

use anyhow::Context as _;
use clap::Parser;
use std::io;
use std::process::ExitCode;

use dstu2_cli::{commands, logging, AppConfig, Cli, Context};

fn main() -> anyhow::Result<ExitCode> {
    // a missing .env is not an error
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.environment, cli.config.as_deref())
        .context("Failed to load configuration")?;

    logging::init_logging(&config.log).context("Failed to initialize logging")?;

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        database_url = %config.database_url,
        "Configuration loaded"
    );

    let ctx = Context::new(config, cli.catalog.as_deref())?;

    let stdout = io::stdout();
    let stderr = io::stderr();
    let ok = commands::run(&ctx, &cli.command, &mut stdout.lock(), &mut stderr.lock())?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
