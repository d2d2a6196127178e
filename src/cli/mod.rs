//! CLI interface for signal-router
//!
//! Provides subcommands for:
//! - `run`: start the router and register configured signals
//! - `config`: show the effective configuration

mod run;

pub use run::RunArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "signal-router")]
#[command(about = "Real-time signal evaluation router for ticker and trade streams")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the router
    Run(RunArgs),
    /// Show the effective configuration
    Config,
}
