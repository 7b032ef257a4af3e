//! Extracts deployed contract addresses from a deployment log.
//!
//! Scans for `<Name> deployed at: <address>` lines and writes the
//! deployments JSON consumed by `ClientBuilder::deployments`.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use megaeth_counter_client::deployments::{DEFAULT_CHAIN_ID, DEFAULT_CHAIN_NAME};
use megaeth_counter_client::{Deployments, Error, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Deployment log scraper.
#[derive(Parser)]
#[command(name = "extract-addresses", version, about)]
struct Cli {
    /// Deployment log to scan.
    #[arg(long)]
    log: PathBuf,

    /// Output JSON file.
    #[arg(long)]
    out: PathBuf,

    /// Chain id recorded in the output.
    #[arg(long, default_value_t = DEFAULT_CHAIN_ID)]
    chain_id: u64,

    /// Chain name recorded in the output.
    #[arg(long, default_value = DEFAULT_CHAIN_NAME)]
    chain_name: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let log = fs::read_to_string(&cli.log)?;
    let deployments = Deployments::scrape(&log, cli.chain_id, cli.chain_name)?;

    if deployments.is_empty() {
        return Err(Error::config(format!(
            "No '<Name> deployed at: <address>' lines found in {}",
            cli.log.display()
        )));
    }

    deployments.save(&cli.out)?;

    for (name, address) in &deployments.contracts {
        info!(%name, %address, "Extracted");
    }
    info!(
        count = deployments.len(),
        out = %cli.out.display(),
        "Deployments written"
    );

    Ok(())
}
