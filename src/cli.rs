//! Command-line interface definition for Guildgate
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands to run the service and to check its configuration.

use clap::{Parser, Subcommand};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "config/guildgate.yaml";

/// Guildgate - Discord verification gate
///
/// Grants a guild role to members who log in with Discord and GitHub
/// and pass a short technical quiz.
#[derive(Parser, Debug, Clone)]
#[command(name = "guildgate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Guildgate
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the HTTP server and the Discord gateway client
    Serve {
        /// Override the listening port
        #[arg(short, long)]
        port: Option<u16>,

        /// Do not connect to the Discord gateway (no welcome messages)
        #[arg(long)]
        no_gateway: bool,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Port override carried by the `serve` subcommand, if any.
    pub fn port_override(&self) -> Option<u16> {
        match &self.command {
            Commands::Serve { port, .. } => *port,
            Commands::CheckConfig => None,
        }
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some(DEFAULT_CONFIG_PATH.to_string()),
            verbose: false,
            json_logs: false,
            command: Commands::Serve {
                port: None,
                no_gateway: false,
            },
        }
    }
}
