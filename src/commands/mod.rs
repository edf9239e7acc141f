/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

- `chat`: Interactive chat session over the realtime transport
- `chats`: One-shot chat management (new, messages, rename, delete)
*/

use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::controller::{ChatController, ControllerCommand};
use crate::error::{ChatwireError, Result};
use crate::protocol::{ChatId, ChatType};
use std::sync::Arc;

// Special commands parser for interactive chat
pub mod special_commands;

// One-shot chat management commands
pub mod chats;

/// Resolve a chat type given on the command line, falling back to the
/// configured default.
pub(crate) fn resolve_chat_type(config: &Config, raw: Option<&str>) -> Result<ChatType> {
    match raw {
        Some(raw) => ChatType::parse_str(raw).map_err(|e| ChatwireError::Config(e).into()),
        None => Ok(config.chat.default_type),
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat session handler.
    //!
    //! Connects the event stream, restores the requested or last active
    //! chat, and runs two loops: a readline loop on its own thread that
    //! turns input lines into [`ControllerCommand`]s, and the controller
    //! event loop on the async runtime that applies them together with
    //! inbound frames.

    use super::*;
    use crate::api::ChatApi;
    use crate::store::LastChatStore;
    use crate::transport::SseTransport;
    use crate::view::TerminalView;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    const COMMAND_BUFFER: usize = 32;

    /// Start an interactive chat session
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `chat_id` - Chat to open; defaults to the last active chat
    /// * `chat_type` - Optional override for the configured chat type
    ///
    /// # Examples
    ///
    /// ```
    /// use chatwire::commands::chat;
    /// use chatwire::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default(), None, None).await?;
    /// ```
    pub async fn run_chat(
        config: Config,
        chat_id: Option<String>,
        chat_type: Option<String>,
    ) -> Result<()> {
        let chat_type = resolve_chat_type(&config, chat_type.as_deref())?;

        let transport = SseTransport::new(config.events_url()?, config.request_timeout())?;
        transport.open_stream().await?;
        tracing::info!("Connected to {}", transport.endpoint());

        let api = ChatApi::new(&config)?;
        let store = LastChatStore::from_config(&config);
        let mut controller = ChatController::new(
            Arc::new(transport),
            api,
            store,
            TerminalView::stdout(),
            chat_type,
        );

        print_welcome_banner(&config, chat_type);

        match controller.restore(chat_id.map(ChatId::new)).await {
            Ok(true) => {}
            Ok(false) => println!(
                "{}",
                "No chat open. Use /new to start one or /open <id>.".yellow()
            ),
            Err(e) => println!("{}", format!("Could not open chat: {:#}", e).red()),
        }

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let cancel = CancellationToken::new();

        // A plain thread rather than a blocking task: the runtime must not
        // wait on a pending readline when the event stream ends.
        let input_cancel = cancel.clone();
        std::thread::spawn(move || {
            if let Err(e) = input_loop(tx) {
                tracing::error!("Input loop failed: {}", e);
            }
            input_cancel.cancel();
        });

        controller.run(rx, cancel).await?;
        tracing::info!("Chat session ended");
        Ok(())
    }

    /// Read lines until exit or EOF, forwarding commands to the controller.
    ///
    /// Returns when the user exits or the controller stops listening.
    fn input_loop(tx: mpsc::Sender<ControllerCommand>) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        loop {
            match rl.readline(&format!("{} ", "chatwire>".bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(trimmed);

                    let command = match line_to_command(trimmed) {
                        Ok(Some(command)) => command,
                        Ok(None) => continue,
                        Err(LineOutcome::Exit) => break,
                        Err(LineOutcome::Invalid(message)) => {
                            eprintln!("{}", message.red());
                            continue;
                        }
                    };

                    if tx.blocking_send(command).is_err() {
                        tracing::debug!("Controller stopped; leaving input loop");
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("^D");
                    break;
                }
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Why an input line produced no command.
    #[derive(Debug, PartialEq)]
    pub(crate) enum LineOutcome {
        Exit,
        Invalid(String),
    }

    /// Map one input line to a controller command.
    ///
    /// `Ok(None)` means the line was handled locally (help).
    pub(crate) fn line_to_command(
        line: &str,
    ) -> std::result::Result<Option<ControllerCommand>, LineOutcome> {
        let command = match parse_special_command(line) {
            Ok(command) => command,
            Err(e) => return Err(LineOutcome::Invalid(e.to_string())),
        };

        Ok(Some(match command {
            SpecialCommand::None => ControllerCommand::Send(line.to_string()),
            SpecialCommand::NewChat(chat_type) => ControllerCommand::NewChat(chat_type),
            SpecialCommand::Open(chat_id) => ControllerCommand::Open(chat_id),
            SpecialCommand::Rename { chat_id, title } => {
                ControllerCommand::Rename { chat_id, title }
            }
            SpecialCommand::Delete(chat_id) => ControllerCommand::Delete(chat_id),
            SpecialCommand::Stop => ControllerCommand::Stop,
            SpecialCommand::SetType(chat_type) => {
                println!("Chat type set to {}", chat_type.to_string().cyan());
                ControllerCommand::SetType(chat_type)
            }
            SpecialCommand::Help => {
                print_help();
                return Ok(None);
            }
            SpecialCommand::Exit => return Err(LineOutcome::Exit),
        }))
    }

    fn print_welcome_banner(config: &Config, chat_type: ChatType) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                 Chatwire Interactive Session                 ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        println!("Server: {}", config.server.base_url.cyan());
        println!("Type:   {}\n", chat_type.to_string().cyan());
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

}
