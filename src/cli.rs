//! CLI module for Salon

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Salon conversation room server
#[derive(Parser, Debug)]
#[command(name = "salon")]
#[command(about = "Multi-agent conversation room server")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "salon.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init,
    /// Start the server (default)
    Serve,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Init) => crate::server::config::init(&cli.config),
        Some(Commands::Serve) | None => crate::server::run(&cli.config).await,
    }
}
