//! One-shot chat management commands
//!
//! These run a single REST call and print the result; they do not open the
//! realtime event stream.

use crate::api::ChatApi;
use crate::commands::resolve_chat_type;
use crate::config::Config;
use crate::error::Result;
use crate::protocol::{ChatId, ChatMessage, MessageKind};
use crate::store::LastChatStore;
use colored::Colorize;
use prettytable::{format, Table};

const CONTENT_WIDTH: usize = 60;

/// Create a chat and print its id.
pub async fn new_chat(config: &Config, chat_type: Option<String>) -> Result<()> {
    let chat_type = resolve_chat_type(config, chat_type.as_deref())?;
    let summary = ChatApi::new(config)?.create_chat(chat_type).await?;

    println!(
        "{}",
        format!("Created chat {} ({})", summary.id, summary.title).green()
    );
    println!(
        "Use {} to open it.",
        format!("chatwire chat --chat {}", summary.id).cyan()
    );
    Ok(())
}

/// Print the message history of a chat, as a table or as JSON.
pub async fn show_messages(config: &Config, chat_id: &str, json: bool) -> Result<()> {
    let chat_id = ChatId::new(chat_id);
    let messages = ChatApi::new(config)?.list_messages(&chat_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!("{}", format!("Chat {} has no messages.", chat_id).yellow());
        return Ok(());
    }

    println!("\nChat {}:", chat_id);
    messages_table(&messages).printstd();
    println!();
    Ok(())
}

/// Rename a chat.
pub async fn rename_chat(config: &Config, chat_id: &str, title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        println!("{}", "Title is empty; nothing to rename.".yellow());
        return Ok(());
    }

    let chat_id = ChatId::new(chat_id);
    ChatApi::new(config)?.rename_chat(&chat_id, title).await?;
    println!(
        "{}",
        format!("Renamed chat {} to {}", chat_id, title).green()
    );
    Ok(())
}

/// Delete a chat, forgetting it if it was the last active one.
pub async fn delete_chat(config: &Config, chat_id: &str) -> Result<()> {
    let chat_id = ChatId::new(chat_id);
    ChatApi::new(config)?.delete_chat(&chat_id).await?;

    let store = LastChatStore::from_config(config);
    if store.load().as_ref() == Some(&chat_id) {
        store.clear();
    }

    println!("{}", format!("Deleted chat {}", chat_id).green());
    Ok(())
}

fn messages_table(messages: &[ChatMessage]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "ID".bold(),
        "From".bold(),
        "Time".bold(),
        "Content".bold()
    ]);

    for message in messages {
        let from = match message.kind() {
            MessageKind::User => "you".green(),
            MessageKind::Assistant => "assistant".cyan(),
            MessageKind::Error => "error".red(),
        };
        let time = message.timestamp.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            message.id.as_str(),
            from,
            time,
            truncate(&message.content, CONTENT_WIDTH)
        ]);
    }

    table
}

/// Shorten `text` to at most `width` characters, on one line.
fn truncate(text: &str, width: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= width {
        return flat;
    }
    let cut: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut)
}
