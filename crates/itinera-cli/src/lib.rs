//! Itinera CLI
//!
//! Provides the `itinera` binary: `serve` runs the WebSocket gateway and
//! `config` inspects the resolved configuration.

pub mod commands;

pub use commands::{Cli, Commands, ConfigCommands};
