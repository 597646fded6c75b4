//! trelay - Transparent TCP reverse proxy.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use trelay::{Cli, Metrics, Relay, Result};

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    if let Err(e) = runtime.block_on(run(&cli)) {
        tracing::error!(error = %e, "relay failed");
        std::process::exit(e.exit_code().into());
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let metrics = Arc::new(Metrics::new());
    let relay = Relay::bind(cli.listen_addr(), cli.relay_config(), metrics).await?;
    relay.run().await
}
