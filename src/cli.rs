//! Command-line interface definition for chatwire
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the interactive chat command and one-shot chat management
//! commands.

use clap::{Parser, Subcommand};

/// chatwire - terminal client for streaming chat servers
///
/// Opens a chat, sends prompts and renders the assistant's streamed reply
/// as it arrives.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatwire")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Chat server base URL (overrides config and CHATWIRE_BASE_URL)
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatwire
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Chat to open; defaults to the last active chat
        #[arg(long = "chat")]
        chat_id: Option<String>,

        /// Chat type for new chats and messages (general, music)
        #[arg(short = 't', long = "type")]
        chat_type: Option<String>,
    },

    /// Create a new chat and print its id
    New {
        /// Chat type (general, music)
        #[arg(short = 't', long = "type")]
        chat_type: Option<String>,
    },

    /// Print the message history of a chat
    Messages {
        /// Chat id
        chat_id: String,

        /// Print raw JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Rename a chat
    Rename {
        /// Chat id
        chat_id: String,

        /// New title
        title: String,
    },

    /// Delete a chat
    Delete {
        /// Chat id
        chat_id: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["chatwire", "chat"]).unwrap();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Chat {
                chat_id: None,
                chat_type: None
            }
        ));
    }

    #[test]
    fn test_cli_parse_chat_with_options() {
        let cli =
            Cli::try_parse_from(["chatwire", "chat", "--chat", "12", "--type", "music"]).unwrap();
        if let Commands::Chat { chat_id, chat_type } = cli.command {
            assert_eq!(chat_id, Some("12".to_string()));
            assert_eq!(chat_type, Some("music".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_global_server_after_subcommand() {
        let cli =
            Cli::try_parse_from(["chatwire", "new", "--server", "http://host:9000"]).unwrap();
        assert_eq!(cli.server, Some("http://host:9000".to_string()));
        assert!(matches!(cli.command, Commands::New { chat_type: None }));
    }

    #[test]
    fn test_cli_parse_messages() {
        let cli = Cli::try_parse_from(["chatwire", "messages", "4", "--json"]).unwrap();
        if let Commands::Messages { chat_id, json } = cli.command {
            assert_eq!(chat_id, "4");
            assert!(json);
        } else {
            panic!("Expected Messages command");
        }
    }

    #[test]
    fn test_cli_parse_rename() {
        let cli = Cli::try_parse_from(["chatwire", "rename", "4", "Road trip songs"]).unwrap();
        if let Commands::Rename { chat_id, title } = cli.command {
            assert_eq!(chat_id, "4");
            assert_eq!(title, "Road trip songs");
        } else {
            panic!("Expected Rename command");
        }
    }

    #[test]
    fn test_cli_parse_delete_requires_id() {
        assert!(Cli::try_parse_from(["chatwire", "delete"]).is_err());
        let cli = Cli::try_parse_from(["chatwire", "delete", "4"]).unwrap();
        assert!(matches!(cli.command, Commands::Delete { chat_id } if chat_id == "4"));
    }

    #[test]
    fn test_cli_parse_verbose() {
        let cli = Cli::try_parse_from(["chatwire", "-v", "chat"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["chatwire"]).is_err());
    }
}
