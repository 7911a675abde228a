mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use datahub_core::{AppConfig, DataHub};

use crate::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid datahub configuration")?;
    if let Some(state_path) = cli.state_path {
        config = config.with_state_path(state_path);
    }
    let hub = DataHub::open(config).context("failed to open datahub")?;
    datahub_web::serve_web(hub, &cli.host, cli.port)
}
