//! CLI interface for Atrium
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines all commands and global flags for controlling the Atrium host.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Atrium plugin host
///
/// A pluggable web host where every feature, including routing, templates
/// and sessions, is a plugin operating under explicit grants.
#[derive(Parser, Debug)]
#[command(name = "atrium")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Boot the site and serve HTTP
    Serve {
        /// Bind address override
        #[arg(long)]
        host: Option<String>,

        /// Bind port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Write a default config file and an empty site document
    Init,

    /// Manage plugins
    Plugins {
        #[command(subcommand)]
        action: PluginAction,
    },
}

/// Plugin management actions
#[derive(Subcommand, Debug)]
pub enum PluginAction {
    /// List plugin records from the site document
    List,
}
