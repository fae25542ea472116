//! # eUprava - government record services
//!
//! ## Usage
//!
//! ```bash
//! # One process per office
//! euprava serve --service border
//! euprava serve --service registry --port 9002
//! euprava -c euprava.toml serve --service prosecution
//!
//! # Tokens
//! euprava keygen
//! euprava issue-token --sub 4 --role Tuzioc
//! ```

use clap::Parser;
use euprava::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // EUPRAVA_LOG_FORMAT=json switches to one JSON object per line.
    let log_format = std::env::var("EUPRAVA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "euprava=debug,euprava_core=debug,tower_http=debug"
    } else {
        "euprava=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗██╗   ██╗██████╗ ██████╗  █████╗ ██╗   ██╗ █████╗
  ██╔════╝██║   ██║██╔══██╗██╔══██╗██╔══██╗██║   ██║██╔══██╗
  █████╗  ██║   ██║██████╔╝██████╔╝███████║██║   ██║███████║
  ██╔══╝  ██║   ██║██╔═══╝ ██╔══██╗██╔══██║╚██╗ ██╔╝██╔══██║
  ███████╗╚██████╔╝██║     ██║  ██║██║  ██║ ╚████╔╝ ██║  ██║
  ╚══════╝ ╚═════╝ ╚═╝     ╚═╝  ╚═╝╚═╝  ╚═╝  ╚═══╝  ╚═╝  ╚═╝

  Government record services v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
