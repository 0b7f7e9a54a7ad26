use clap::{Parser, Subcommand};

/// authgate — authentication and abuse-control core
#[derive(Parser)]
#[command(name = "authgate", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Token operations
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a signed token for a subject (operator/testing use)
    Issue {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "USER")]
        role: String,
        /// Lifetime in seconds; defaults to the configured token TTL
        #[arg(long)]
        ttl: Option<i64>,
    },
    /// Revoke a token for its remaining lifetime
    Revoke {
        #[arg(long)]
        token: String,
    },
}
