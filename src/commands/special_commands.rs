//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` are commands rather than messages. They let the
//! user:
//! - Create, open, rename and delete chats
//! - Stop the reply that is being streamed
//! - Change the chat type used for new chats and messages
//! - Display help
//!
//! Command names are case-insensitive; arguments (chat ids, titles) are
//! kept as typed.

use crate::protocol::{ChatId, ChatType};
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Create a chat, optionally of a specific type, and open it
    NewChat(Option<ChatType>),

    /// Open an existing chat
    Open(ChatId),

    /// Rename a chat
    Rename { chat_id: ChatId, title: String },

    /// Delete a chat
    Delete(ChatId),

    /// Stop the in-flight reply
    Stop,

    /// Change the chat type for new chats and messages
    SetType(ChatType),

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; the input is a chat message
    None,
}

fn missing(command: &str, usage: &str) -> CommandError {
    CommandError::MissingArgument {
        command: command.to_string(),
        usage: usage.to_string(),
    }
}

fn parse_chat_type(command: &str, arg: &str) -> Result<ChatType, CommandError> {
    ChatType::parse_str(arg).map_err(|_| CommandError::UnsupportedArgument {
        command: command.to_string(),
        arg: arg.to_string(),
    })
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns CommandError::UnknownCommand if input starts with "/" but is not a valid command.
/// Returns CommandError::UnsupportedArgument if a command receives an invalid argument.
/// Returns CommandError::MissingArgument if a command requires an argument but none was provided.
///
/// # Examples
///
/// ```
/// use chatwire::commands::special_commands::{parse_special_command, SpecialCommand};
/// use chatwire::protocol::{ChatId, ChatType};
///
/// let cmd = parse_special_command("/open 12").unwrap();
/// assert_eq!(cmd, SpecialCommand::Open(ChatId::new("12")));
///
/// let cmd = parse_special_command("/new music").unwrap();
/// assert_eq!(cmd, SpecialCommand::NewChat(Some(ChatType::Music)));
///
/// let cmd = parse_special_command("what's playing?").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match name.as_str() {
        "/new" => {
            if rest.is_empty() {
                Ok(SpecialCommand::NewChat(None))
            } else {
                parse_chat_type("/new", rest).map(|t| SpecialCommand::NewChat(Some(t)))
            }
        }

        "/open" => {
            if rest.is_empty() {
                Err(missing("/open", "/open <chat_id>"))
            } else if rest.contains(char::is_whitespace) {
                Err(CommandError::UnsupportedArgument {
                    command: "/open".to_string(),
                    arg: rest.to_string(),
                })
            } else {
                Ok(SpecialCommand::Open(ChatId::new(rest)))
            }
        }

        "/rename" => {
            let usage = "/rename <chat_id> <title>";
            let Some((chat_id, title)) = rest.split_once(char::is_whitespace) else {
                return Err(missing("/rename", usage));
            };
            let title = title.trim();
            if title.is_empty() {
                return Err(missing("/rename", usage));
            }
            Ok(SpecialCommand::Rename {
                chat_id: ChatId::new(chat_id),
                title: title.to_string(),
            })
        }

        "/delete" => {
            if rest.is_empty() {
                Err(missing("/delete", "/delete <chat_id>"))
            } else {
                Ok(SpecialCommand::Delete(ChatId::new(rest)))
            }
        }

        "/stop" => Ok(SpecialCommand::Stop),

        "/type" => {
            if rest.is_empty() {
                Err(missing("/type", "/type <general|music>"))
            } else {
                parse_chat_type("/type", rest).map(SpecialCommand::SetType)
            }
        }

        "/help" | "/?" => Ok(SpecialCommand::Help),

        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

/// Display help text for special commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
===========================================

CHATS:
  /new [type]             - Create a chat and open it (type: general, music)
  /open <chat_id>         - Open an existing chat
  /rename <chat_id> <title> - Rename a chat
  /delete <chat_id>       - Delete a chat

REPLIES:
  /stop                   - Stop the reply that is being streamed
  /type <general|music>   - Chat type used for new chats and messages

SESSION:
  /help                   - Show this help message
  /?                      - Same as /help
  exit, quit, /exit       - Exit interactive mode

NOTES:
  - Command names are case-insensitive
  - Any other text is sent to the active chat
  - Input is ignored while a reply is streaming; use /stop to end it
"#
    );
}
