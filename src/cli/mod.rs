//! Command line interface
//!
//! Clap command structures, command handlers and output formatting.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::run::RunArgs;

/// Top-level arguments
#[derive(Parser)]
#[command(name = "cover-agent")]
#[command(about = "Raise unit test coverage of a source file with model-generated tests", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Config file layered over .cover-agent/config.yaml
    #[arg(short, long, global = true, env = "COVER_AGENT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Generate and validate tests until the coverage target or the
    /// iteration limit is reached
    Run(RunArgs),
}

/// Print a fatal error to stderr and exit with status 1.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": chain,
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("{} {err}", console::style("error:").red().bold());
        for cause in err.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
    }
    std::process::exit(1);
}
