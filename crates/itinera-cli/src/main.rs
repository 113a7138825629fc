//! Itinera - conversational trip planner

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use itinera_config::{find_config_file, load_config, resolve_config};
use itinera_gateway::GatewayServer;
use itinera_planner::Planner;
use itinera_providers::collaborators_from_config;

mod commands;

use commands::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let result = match &cli.command {
        Commands::Serve { host, port } => run_serve(config_path, host.clone(), *port).await,
        Commands::Config { command } => run_config(command, config_path),
    };

    if let Err(e) = result {
        eprintln!("{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_serve(
    config_path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    itinera_telemetry::init_subscriber(&config.telemetry);

    let collaborators = collaborators_from_config(&config.providers)
        .context("failed to set up providers")?;
    let planner = Planner::new(collaborators)
        .with_history_window(config.planner.history_window)
        .into_shared();

    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);

    tracing::info!(
        model = %config.providers.gemini.model,
        synthesis_model = %config.providers.gemini.synthesis_model,
        heartbeat_secs = config.gateway.heartbeat_interval_secs,
        "starting itinera gateway"
    );

    GatewayServer::from_settings(planner, &config.gateway)
        .start(&host, port)
        .await?;
    Ok(())
}

fn run_config(command: &ConfigCommands, config_path: Option<&Path>) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            let yaml = serde_yaml_ng::to_string(&config.redacted())
                .context("failed to render configuration")?;
            print!("{}", yaml);
        }
        ConfigCommands::Path => {
            if config_path.is_none() && find_config_file().is_none() {
                println!("{}", "No configuration file found, using defaults".yellow());
                return Ok(());
            }
            let resolved = resolve_config(config_path)?;
            println!("{}", resolved.path.display());
        }
    }
    Ok(())
}
