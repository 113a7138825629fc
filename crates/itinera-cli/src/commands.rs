//! CLI commands

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Itinera - conversational trip planner
#[derive(Parser, Debug)]
#[command(name = "itinera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to itinera.{jsonc,json,yml,yaml} in the
    /// current directory, then ~/.config/itinera/)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the WebSocket gateway
    Serve {
        /// Address to bind (overrides gateway.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind (overrides gateway.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration with credentials hidden
    Show,
    /// Print the configuration file in use
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::parse_from(["itinera", "serve", "--host", "0.0.0.0", "-p", "9000"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            }
            _ => panic!("Expected Serve"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let cli = Cli::parse_from(["itinera", "config", "show", "--config", "trip.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("trip.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Show
            }
        ));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["itinera"]).is_err());
    }
}
