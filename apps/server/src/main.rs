//! AskData: ask questions of a relational store in plain language.
//!
//! Serves the `POST /ask` HTTP API and a few local commands for
//! inspecting the store and configuration.

mod commands;
mod http;

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
