//! autoservice CLI: vehicle-service backend and workshop search assistant.
//!
//! Serves the REST API, seeds demo data and runs one-off assistant
//! queries from the terminal.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
