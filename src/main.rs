//! PFC client binary
//!
//! Connects to the configured server, answers its handshake and runs the
//! session until Ctrl-C or the server goes away.

use clap::Parser;
use tracing::{error, info, warn};

use pfc_client::cli::{Cli, Commands, ConfigSubcommand};
use pfc_client::client::{Client, LogHandler, ShutdownHandle};
use pfc_client::config::{self, AppConfig};
use pfc_client::error::{Error, Result};
use pfc_client::{logging, source, version};

fn main() {
    if let Err(e) = run() {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            version::print_version();
            Ok(())
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            handle_config_command(subcommand)
        }
        Commands::Run { config, addr } => {
            let mut app_config = AppConfig::load(config.as_deref())?;
            if let Some(addr) = addr {
                app_config.client.remote_addr = addr;
                app_config.validate()?;
            }

            // Held until exit so the file writer flushes
            let _log_guards = logging::init_logging(&app_config.logging, cli.verbose, cli.quiet)?;

            let build = version::build_info();
            info!(
                version = %build.full_version(),
                target = %build.target,
                profile = %build.profile,
                "Starting PFC client"
            );

            run_client(app_config)
        }
    }
}

/// Run the client until shutdown or a fatal error
fn run_client(app_config: AppConfig) -> Result<()> {
    let client_config = app_config.client_config();
    info!(
        remote_addr = %client_config.remote_addr,
        dial_interval_ms = client_config.dial_interval.as_millis() as u64,
        max_dial_attempts = client_config.max_dial_attempts,
        strict_handshake = client_config.strict_handshake,
        source = ?app_config.source.kind,
        "Configuration loaded"
    );

    let message_source = source::from_settings(&app_config.source)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create runtime: {}", e)))?;

    runtime.block_on(async move {
        let (handle, signal) = ShutdownHandle::pair();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    handle.close();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });

        let client = Client::new(client_config);
        match client.run(message_source, LogHandler, signal).await {
            Ok(()) => {
                info!("Client stopped");
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e.format_for_log(), "Client stopped, a restart may succeed");
                Err(e)
            }
            Err(e) => {
                error!(error = %e.format_for_log(), "Client failed");
                Err(e)
            }
        }
    })
}

fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = AppConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate { config } => {
            AppConfig::load(config.as_deref())?;
            println!("Configuration is valid.");
        }
    }

    Ok(())
}
