//! CLI argument definitions using clap
//!
//! Commands:
//! - tablegate serve --config <path>
//! - tablegate serve --commands <dir> [--port <port>] [--address <addr>] [--dev]
//! - tablegate ls --commands <dir>
//! - tablegate run --commands <dir> <path> [query]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_COMMANDS_DIR: &str = "./commands";

/// tablegate - serve structured command output over HTTP
#[derive(Parser, Debug)]
#[command(name = "tablegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server
    ///
    /// Routes come from a config file, or a single command directory is
    /// served at /.
    Serve {
        /// Server config file, YAML or TOML
        #[arg(long, conflicts_with = "commands")]
        config: Option<PathBuf>,

        /// Directory of YAML commands to serve at /
        #[arg(long)]
        commands: Option<PathBuf>,

        /// Address to bind to (default: localhost)
        #[arg(long)]
        address: Option<String>,

        /// Port to bind to (default: 8080)
        #[arg(long, short = 'p')]
        port: Option<u16>,

        /// Reload templates on every request and allow any CORS origin
        #[arg(long)]
        dev: bool,
    },

    /// List the commands of a directory
    Ls {
        /// Directory of YAML commands
        #[arg(long, default_value = DEFAULT_COMMANDS_DIR)]
        commands: PathBuf,
    },

    /// Run one command and print its output
    Run {
        /// Directory of YAML commands
        #[arg(long, default_value = DEFAULT_COMMANDS_DIR)]
        commands: PathBuf,

        /// Command path, e.g. `people/users`
        path: String,

        /// Parameters as a query string, e.g. `role=admin&output=json`
        #[arg(default_value = "")]
        query: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
