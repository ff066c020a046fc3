//! hnsift CLI: incremental crawler for the Hacker News front page.
//!
//! Fetches top stories with their article text and best comments,
//! classifies them by topic and keeps a deduplicated local archive.

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
