use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::constants::{
    ENV_CONFIG, ENV_DEBUG, ENV_HOST, ENV_INGEST_PATH, ENV_INGEST_TOKEN, ENV_PORT, ENV_TIMEZONE,
};

#[derive(Parser)]
#[command(name = "botboard")]
#[command(version, about = "Bot activity statistics server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Enable debug logging of every inbound frame
    #[arg(long, global = true, env = ENV_DEBUG)]
    pub debug: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Shared secret bot clients must present
    #[arg(long, global = true, env = ENV_INGEST_TOKEN, hide_env_values = true)]
    pub ingest_token: Option<String>,

    /// Route the bot socket is served on
    #[arg(long, global = true, env = ENV_INGEST_PATH)]
    pub ingest_path: Option<String>,

    /// Time zone for calendar days ("local" or an IANA name)
    #[arg(long, global = true, env = ENV_TIMEZONE)]
    pub timezone: Option<String>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the server (default command)
    Start,
    /// System maintenance commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum SystemCommands {
    /// Delete the local data directory. Requires confirmation.
    Prune {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub debug: bool,
    pub config: Option<PathBuf>,
    pub ingest_token: Option<String>,
    pub ingest_path: Option<String>,
    pub timezone: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        debug: cli.debug,
        config: cli.config,
        ingest_token: cli.ingest_token,
        ingest_path: cli.ingest_path,
        timezone: cli.timezone,
    };
    (config, cli.command)
}
