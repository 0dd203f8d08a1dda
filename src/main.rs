//! cover-agent CLI entry point.

use clap::Parser;

use cover_agent::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run(args) => cover_agent::cli::commands::run::execute(args, cli.config, cli.json).await,
    };

    if let Err(err) = result {
        cover_agent::cli::handle_error(err, cli.json);
    }
}
