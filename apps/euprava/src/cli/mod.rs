//! # eUprava CLI Module
//!
//! ## Available Commands
//!
//! - `serve` - Start one of the four office services
//! - `keygen` - Generate an ed25519 token signing key pair
//! - `issue-token` - Sign a bearer token for a user and role

mod commands;

use crate::config::Service;
use clap::{Parser, Subcommand};
use euprava_core::{EupravaError, Role};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// eUprava - government record services
///
/// Border control, civil registry, prosecution and court, each served by
/// its own process and linked over HTTP.
#[derive(Parser, Debug)]
#[command(name = "euprava")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an office service
    Serve {
        /// Which office to serve
        #[arg(short, long, value_enum)]
        service: Service,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to (defaults to the office's well-known port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Path to the record database
        #[arg(short = 'D', long)]
        database: Option<PathBuf>,
    },

    /// Generate a token signing key pair
    Keygen,

    /// Sign a bearer token
    IssueToken {
        /// User account id the token is issued to
        #[arg(long)]
        sub: u64,

        /// Role of the caller: Policajac, Gradjanin, GranicniSluzbenik, Tuzioc,
        /// Istrazitelj or Sudija
        #[arg(long)]
        role: Role,

        /// Base64 signing key (falls back to EUPRAVA_SIGNING_KEY)
        #[arg(long)]
        signing_key: Option<String>,

        /// Token lifetime in seconds (defaults to auth.token_ttl_secs)
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), EupravaError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve {
            service,
            host,
            port,
            database,
        } => cmd_serve(config_path, service, &host, port, database).await,
        Commands::Keygen => {
            cmd_keygen();
            Ok(())
        }
        Commands::IssueToken {
            sub,
            role,
            signing_key,
            ttl_secs,
        } => cmd_issue_token(config_path, sub, role, signing_key, ttl_secs),
    }
}
