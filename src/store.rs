//! Last active chat persistence
//!
//! Remembers which chat was open so the next session can reopen it. The
//! state is a single-line file named `last_chat` under the state
//! directory. Losing it only costs the user a `/open`, so every failure is
//! logged and swallowed.

use std::path::{Path, PathBuf};

use crate::protocol::ChatId;

const LAST_CHAT_FILE: &str = "last_chat";

/// File-backed record of the last active chat id.
#[derive(Debug, Clone)]
pub struct LastChatStore {
    path: Option<PathBuf>,
}

impl LastChatStore {
    /// Store rooted at `state_dir`.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            path: Some(state_dir.as_ref().join(LAST_CHAT_FILE)),
        }
    }

    /// Store that remembers nothing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Store for the configured state directory, or a disabled one when
    /// remembering is off or no directory can be determined.
    pub fn from_config(config: &crate::config::Config) -> Self {
        if !config.chat.remember_last_chat {
            return Self::disabled();
        }
        match config.state_dir() {
            Some(dir) => Self::new(dir),
            None => {
                tracing::warn!("No state directory available; last chat will not be remembered");
                Self::disabled()
            }
        }
    }

    /// Last saved chat id, if any.
    pub fn load(&self) -> Option<ChatId> {
        let path = self.path.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let id = contents.trim();
                if id.is_empty() {
                    None
                } else {
                    Some(ChatId::new(id))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Remember `chat_id` as the last active chat.
    pub fn save(&self, chat_id: &ChatId) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!("Failed to create {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = std::fs::write(path, format!("{}\n", chat_id)) {
            tracing::warn!("Failed to write {}: {}", path.display(), e);
        }
    }

    /// Forget the last active chat.
    pub fn clear(&self) {
        let Some(path) = self.path.as_ref() else {
            return;
        };
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
