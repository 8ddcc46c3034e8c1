//! Command-line interface for logsage.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions about a log file, answered by a local LLM grounded in
/// retrieved excerpts.
#[derive(Debug, Parser)]
#[command(name = "logsage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a file as the active corpus, replacing the previous one
    Upload(commands::UploadArgs),

    /// Ask a question about the active corpus
    Ask(commands::AskArgs),

    /// Show daemon, model and corpus status
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),

    /// Start, stop or restart the background daemon
    Serve(commands::ServeArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from(["logsage", "ask", "who failed to log in?", "-k", "6", "--sources"]);
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.question, "who failed to log in?");
                assert_eq!(args.k, Some(6));
                assert!(args.sources);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_format() {
        let cli = Cli::parse_from(["logsage", "status", "--format", "json"]);
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_parse_serve_stop() {
        let cli = Cli::parse_from(["logsage", "serve", "stop"]);
        match cli.command {
            Commands::Serve(args) => {
                assert!(matches!(args.command, Some(commands::ServeCommand::Stop)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
