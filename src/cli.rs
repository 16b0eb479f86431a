//! Command-line interface for strictly_referee.

use clap::{Parser, Subcommand};

/// Strictly Referee - two-player tic-tac-toe server
#[derive(Parser, Debug)]
#[command(name = "strictly_referee")]
#[command(about = "Pairs players and referees tic-tac-toe matches", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the referee server
    Serve {
        /// Path to server configuration file (used if it exists)
        #[arg(short, long, default_value = "referee.toml")]
        config: std::path::PathBuf,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Host several matches at once instead of one at a time
        #[arg(long)]
        concurrent_matches: bool,
    },
}
