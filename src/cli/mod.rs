//! Command line interface for the careflow-server binary.
//!
//! Parsing uses clap; terminal output goes through [`output::Output`].

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Careflow - chat-driven supply approvals
///
/// Serves the chat, inventory and order endpoints used by a hospital
/// operations dashboard.
#[derive(Parser, Debug)]
#[command(
    name = "careflow-server",
    author = "Careflow <build@careflow.dev>",
    version,
    about = "Careflow - chat-driven supply approvals",
    long_about = "Chat-driven supply approvals for hospital operations dashboards.\n\n\
                  Run without arguments to start the server, or use 'init' to write a\n\
                  starter configuration.",
    after_help = "EXAMPLES:\n    \
                  careflow-server init                 # Write careflow.toml\n    \
                  careflow-server                      # Start the server\n    \
                  careflow-server config --validate    # Check the configuration\n    \
                  careflow-server inventory            # Print the starting stock"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "careflow.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Write a starter careflow.toml and .env.example
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration information
    Config {
        /// Validate the configuration file and report warnings
        #[arg(long)]
        validate: bool,
    },

    /// Print the starting inventory, marking low-stock records
    Inventory,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn output(&self) -> output::Output {
        if self.no_color {
            output::Output::no_color()
        } else {
            output::Output::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["careflow-server"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("careflow.toml"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_init_flags() {
        let cli = Cli::try_parse_from(["careflow-server", "init", "site", "--force"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Init {
                path: PathBuf::from("site"),
                force: true
            })
        );
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "careflow-server",
            "config",
            "--validate",
            "--config",
            "other.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.command, Some(Commands::Config { validate: true }));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["careflow-server", "deploy"]).is_err());
    }
}
