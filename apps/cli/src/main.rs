//! MediaImport CLI: bulk-import media described in a CSV file.
//!
//! Downloads every `src` URL, stores it in a local media library, and applies
//! alt text, caption, and description from the row.

mod commands;
mod tag_hook;

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
