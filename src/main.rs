//! ordercast entry point.
//!
//! This file is intentionally thin: it parses the CLI, sets up tracing,
//! loads configuration, and hands off to `server::start_server`. All core
//! logic lives in the library modules.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ordercast::config::{CONFIG_FILE, TrackerConfig};
use ordercast::server;

#[derive(Parser)]
#[command(name = "ordercast")]
#[command(version, about = "Order pipeline stage tracker with live SSE subscriptions")]
pub struct Cli {
    /// Path to the config file. Defaults to ./ordercast.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tracking server
    Serve {
        /// Port to serve on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds between progress ticks (overrides config)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Enable dev mode (CORS permissive for local frontend dev)
        #[arg(long)]
        dev: bool,
    },
    /// View or initialize configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write a default ordercast.toml to the working directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            interval_secs,
            dev,
        } => {
            let mut config = TrackerConfig::load(cli.config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(interval_secs) = interval_secs {
                config.interval_secs = interval_secs;
            }
            config.dev_mode = dev;
            server::start_server(config).await
        }
        Commands::Config { command } => {
            let command = command.unwrap_or(ConfigCommands::Show);
            match command {
                ConfigCommands::Show => {
                    let config = TrackerConfig::load(cli.config.as_deref())?;
                    println!("{}", config.to_toml()?);
                }
                ConfigCommands::Init => {
                    let path = PathBuf::from(CONFIG_FILE);
                    if path.exists() {
                        anyhow::bail!("{} already exists", CONFIG_FILE);
                    }
                    std::fs::write(&path, TrackerConfig::default().to_toml()?)?;
                    println!("Wrote {}", CONFIG_FILE);
                }
            }
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
