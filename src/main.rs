mod auth;
mod cli;
mod config;
mod develocity;
mod error;
mod insights;
mod output;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting RemedyLens - Build Failure Remediation Insights");
    cli.execute().await?;

    Ok(())
}
