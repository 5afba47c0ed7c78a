//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "chatrag")]
#[command(about = "Ask questions about a group chat's history")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file (default: config.toml, then config.example.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Answer a question from a chat transcript
    Ask {
        /// The question to answer
        question: String,
        /// Chat transcript (JSON export)
        #[arg(short, long)]
        transcript: PathBuf,
        /// Ask about what this participant said
        #[arg(short, long)]
        participant: Option<String>,
        /// Lookback window for participant search
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Long-term memory about the chat, passed to the model
        #[arg(long)]
        memory: Option<String>,
        /// Only answer from the chat; never fall back to general knowledge
        #[arg(long)]
        direct: bool,
        /// Answer without any chat context
        #[arg(long)]
        no_context: bool,
        /// Print the full response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run retrieval only and show the ranked fragments
    Search {
        /// Search query
        query: String,
        /// Chat transcript (JSON export)
        #[arg(short, long)]
        transcript: PathBuf,
        /// Restrict message search to this participant
        #[arg(short, long)]
        participant: Option<String>,
        /// Lookback window for participant search
        #[arg(long)]
        lookback_days: Option<u32>,
        /// Maximum number of results to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Show current configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "chatrag",
            "ask",
            "when is the release?",
            "--transcript",
            "chat.json",
            "--participant",
            "alice",
            "--direct",
        ])
        .unwrap();

        match cli.command {
            Commands::Ask {
                question,
                participant,
                direct,
                no_context,
                ..
            } => {
                assert_eq!(question, "when is the release?");
                assert_eq!(participant.as_deref(), Some("alice"));
                assert!(direct);
                assert!(!no_context);
            }
            _ => panic!("Expected ask command"),
        }
    }

    #[test]
    fn test_search_requires_transcript() {
        assert!(Cli::try_parse_from(["chatrag", "search", "release"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["chatrag", "config", "--config", "custom.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }
}
