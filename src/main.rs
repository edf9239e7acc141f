//! Chatwire - streaming chat client CLI
//!
#![doc = "Main entry point for the chatwire client."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatwire::cli::{Cli, Commands};
use chatwire::commands;
use chatwire::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat { chat_id, chat_type } => {
            tracing::info!("Starting interactive chat");
            if let Some(id) = &chat_id {
                tracing::debug!("Opening chat: {}", id);
            }
            commands::chat::run_chat(config, chat_id, chat_type).await?;
            Ok(())
        }
        Commands::New { chat_type } => {
            commands::chats::new_chat(&config, chat_type).await?;
            Ok(())
        }
        Commands::Messages { chat_id, json } => {
            commands::chats::show_messages(&config, &chat_id, json).await?;
            Ok(())
        }
        Commands::Rename { chat_id, title } => {
            commands::chats::rename_chat(&config, &chat_id, &title).await?;
            Ok(())
        }
        Commands::Delete { chat_id } => {
            commands::chats::delete_chat(&config, &chat_id).await?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so they do not interleave with streamed replies.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chatwire=debug"
    } else {
        "chatwire=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
