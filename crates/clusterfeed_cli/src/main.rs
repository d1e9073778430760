//! Clusterfeed CLI
//!
//! Command-line tools for the cluster event stream.
//!
//! # Commands
//!
//! - `watch` - Subscribe to an endpoint and print events as they arrive
//! - `decode` - Decode recorded event lines from a file or stdin

mod commands;

use clap::{Parser, Subcommand};
use clusterfeed_client::{SubscriptionConfig, DEFAULT_EVENTS_URL};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Cluster event stream tools.
#[derive(Parser)]
#[command(name = "clusterfeed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Subscribe to an event endpoint and print events
    Watch {
        /// Event stream URL
        #[arg(short, long, default_value = DEFAULT_EVENTS_URL)]
        url: String,

        /// Connect timeout in milliseconds (0 disables it)
        #[arg(long, default_value = "10000")]
        connect_timeout_ms: u64,

        /// Pause between reconnect attempts in milliseconds
        #[arg(long, default_value = "0")]
        reconnect_delay_ms: u64,

        /// Stop after this many events
        #[arg(short = 'n', long)]
        max_events: Option<u64>,

        /// Exit on the first stream error instead of reconnecting
        #[arg(long)]
        exit_on_error: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode recorded event lines
    Decode {
        /// Input file; reads stdin when omitted
        input: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Watch {
            url,
            connect_timeout_ms,
            reconnect_delay_ms,
            max_events,
            exit_on_error,
            format,
        } => {
            let mut config = SubscriptionConfig::new(url)
                .with_reconnect_delay(Duration::from_millis(reconnect_delay_ms));
            config = if connect_timeout_ms == 0 {
                config.without_connect_timeout()
            } else {
                config.with_connect_timeout(Duration::from_millis(connect_timeout_ms))
            };
            commands::watch::run(config, max_events, exit_on_error, &format).await?;
        }
        Commands::Decode { input, format } => {
            commands::decode::run(input.as_deref(), &format)?;
        }
        Commands::Version => {
            println!("clusterfeed v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
