//! CLI interface for riskcore
//!
//! Provides subcommands for:
//! - `run`: Replay recorded market data and signals through the risk gate
//! - `status`: Show the persisted state
//! - `config`: Show and validate the effective configuration

mod run;
mod status;

pub use run::RunArgs;
pub use status::StatusArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "riskcore")]
#[command(about = "Real-time risk and capital allocation core for multi-strategy trading")]
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
    /// Drive the runtime from a recorded event file with paper execution
    Run(RunArgs),
    /// Show breaker level, weights and positions from the state snapshot
    Status(StatusArgs),
    /// Show the effective configuration and whether it validates
    Config,
}
