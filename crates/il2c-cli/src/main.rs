//! il2c CLI - rebuild expression trees from stack bytecode.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

mod commands;
mod config;

use commands::blocks::BlocksCommand;
use commands::translate::TranslateCommand;

#[derive(Parser)]
#[command(
    name = "il2c",
    version,
    about = "Rebuild expression trees from stack bytecode",
    long_about = "il2c reconciles the evaluation stack across forks and merges and\n\
                  annotates merged values with phi nodes.\n\n\
                  Translate a module:  il2c translate module.json\n\
                  Inspect blocks:      il2c blocks module.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate every method of a module
    Translate(TranslateCommand),
    /// Show label status and block origin of every instruction
    Blocks(BlocksCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Translate(cmd) => cmd.run(&config),
        Commands::Blocks(cmd) => cmd.run(),
    }
}
