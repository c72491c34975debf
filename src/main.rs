use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use devcluster::adapter::inbound::cli::command::{Cli, ColorChoice};
use devcluster::adapter::inbound::cli::dispatch;
use devcluster::adapter::inbound::cli::output::{self, OutputConfig};
use devcluster::infrastructure::bootstrap;
use devcluster::infrastructure::config::Config;

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::discover(cli.config.as_deref()).context("loading configuration")?;
    match (cli.quiet, cli.verbose) {
        (true, _) => config.logging.level = "warn".into(),
        (false, 1) => config.logging.level = "debug".into(),
        (false, v) if v >= 2 => config.logging.level = "trace".into(),
        _ => {}
    }
    config.logging.init();
    debug!(?config, "configuration loaded");

    let app = bootstrap::build(&config).context("connecting to the container engine")?;
    dispatch(&app, &cli.command).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    output::configure(OutputConfig::new(cli.json, cli.quiet));
    output::set_color(match cli.color {
        ColorChoice::Auto => None,
        ColorChoice::Always => Some(true),
        ColorChoice::Never => Some(false),
    });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
