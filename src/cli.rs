//! CLI argument parsing using clap v4

use clap::{Parser, Subcommand};

/// PFC client - connects to a PFC server and runs a duplex session
///
/// Dials the server with fixed-interval retry, answers its handshake, then
/// sends a payload on every tick while logging whatever the server sends.
#[derive(Parser, Debug)]
#[command(name = "pfc-client")]
#[command(author, version, long_about = None)]
#[command(about = "PFC client - connects to a PFC server and runs a duplex session")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to the server and run until Ctrl-C or the server goes away
    Run {
        /// Path to configuration file
        #[arg(short, long, env = "PFC_CONFIG")]
        config: Option<String>,

        /// Server address, overriding the config (host:port or :port)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the effective configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}
