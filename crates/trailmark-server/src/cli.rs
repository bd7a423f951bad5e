//! Command-line interface

use clap::{Parser, Subcommand};

/// Audit trail demo service
#[derive(Parser, Debug)]
#[command(name = "trailmark")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Insert demo widgets and users on startup
        #[arg(long)]
        seed: bool,
    },

    /// Print a bearer credential for an actor
    IssueToken {
        /// Actor id to put in the credential
        #[arg(short, long)]
        actor: i64,

        /// Lifetime in seconds (defaults to JWT_TTL_SECS)
        #[arg(long)]
        ttl: Option<u64>,
    },
}
