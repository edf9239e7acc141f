//! Configuration management for chatwire
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, lowest first: built-in defaults, YAML file, `CHATWIRE_*`
//! environment variables, command-line flags.

use crate::error::{ChatwireError, Result};
use anyhow::Context;
use crate::protocol::ChatType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Main configuration structure for chatwire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat server connection settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Client behaviour settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Chat server connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the chat server; REST paths are resolved against it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path of the realtime events endpoint (POST out, SSE in)
    #[serde(default = "default_events_path")]
    pub events_path: String,

    /// Timeout for individual HTTP requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_events_path() -> String {
    "/events".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            events_path: default_events_path(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// Client behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Chat type used for new chats and outgoing messages
    #[serde(default)]
    pub default_type: ChatType,

    /// Reopen the last active chat on startup
    #[serde(default = "default_remember_last_chat")]
    pub remember_last_chat: bool,

    /// Directory for local client state; platform data dir when unset
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_remember_last_chat() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_type: ChatType::default(),
            remember_last_chat: default_remember_last_chat(),
            state_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(ChatwireError::from)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(ChatwireError::from)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("CHATWIRE_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Ok(events_path) = std::env::var("CHATWIRE_EVENTS_PATH") {
            self.server.events_path = events_path;
        }

        if let Ok(timeout) = std::env::var("CHATWIRE_REQUEST_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.server.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATWIRE_REQUEST_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(chat_type) = std::env::var("CHATWIRE_CHAT_TYPE") {
            match ChatType::parse_str(&chat_type) {
                Ok(value) => self.chat.default_type = value,
                Err(e) => tracing::warn!("Invalid CHATWIRE_CHAT_TYPE: {}", e),
            }
        }

        if let Ok(state_dir) = std::env::var("CHATWIRE_STATE_DIR") {
            self.chat.state_dir = Some(PathBuf::from(state_dir));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(server) = &cli.server {
            tracing::debug!("Using server override: {}", server);
            self.server.base_url = server.clone();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Config`] describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.server.base_url).map_err(|e| {
            ChatwireError::Config(format!(
                "Invalid server.base_url {}: {}",
                self.server.base_url, e
            ))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ChatwireError::Config(format!(
                "server.base_url must use http or https, got {}",
                url.scheme()
            ))
            .into());
        }

        if !self.server.events_path.starts_with('/') {
            return Err(ChatwireError::Config(
                "server.events_path must start with '/'".to_string(),
            )
            .into());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ChatwireError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.request_timeout_seconds > 600 {
            return Err(ChatwireError::Config(
                "server.request_timeout_seconds must be less than or equal to 600".to_string(),
            )
            .into());
        }

        Ok(())
    }

    /// Resolve a server path (such as `/api/chats`) against the base URL.
    ///
    /// Any path on the base URL is kept as a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ChatwireError::Config`] if the result is not a valid URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.server.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ChatwireError::Config(format!("Invalid URL {}: {}", joined, e)).into())
    }

    /// URL of the realtime events endpoint.
    pub fn events_url(&self) -> Result<Url> {
        self.endpoint(&self.server.events_path)
    }

    /// Per-request HTTP timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    /// Directory holding local client state.
    ///
    /// Returns `None` when no directory is configured and the platform has
    /// no home directory to derive one from.
    pub fn state_dir(&self) -> Option<PathBuf> {
        self.chat.state_dir.clone().or_else(|| {
            directories::ProjectDirs::from("", "", "chatwire")
                .map(|dirs| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ENV_VARS: [&str; 5] = [
        "CHATWIRE_BASE_URL",
        "CHATWIRE_EVENTS_PATH",
        "CHATWIRE_REQUEST_TIMEOUT",
        "CHATWIRE_CHAT_TYPE",
        "CHATWIRE_STATE_DIR",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    fn cli(server: Option<&str>) -> crate::cli::Cli {
        crate::cli::Cli {
            config: None,
            verbose: false,
            server: server.map(str::to_string),
            command: crate::cli::Commands::New { chat_type: None },
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:5000");
        assert_eq!(config.server.events_path, "/events");
        assert_eq!(config.server.request_timeout_seconds, 30);
        assert_eq!(config.chat.default_type, ChatType::General);
        assert!(config.chat.remember_last_chat);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = Config::default();
        config.server.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.server.base_url = "ftp://example.com".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_config_validation_events_path() {
        let mut config = Config::default();
        config.server.events_path = "events".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_timeout_bounds() {
        let mut config = Config::default();
        config.server.request_timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.server.request_timeout_seconds = 601;
        assert!(config.validate().is_err());
        config.server.request_timeout_seconds = 600;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
server:
  base_url: https://chat.example.com/app
  request_timeout_seconds: 10
chat:
  default_type: music
  remember_last_chat: false
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.base_url, "https://chat.example.com/app");
        assert_eq!(config.server.events_path, "/events");
        assert_eq!(config.server.request_timeout_seconds, 10);
        assert_eq!(config.chat.default_type, ChatType::Music);
        assert!(!config.chat.remember_last_chat);
    }

    #[test]
    fn test_config_from_yaml_rejects_unknown_chat_type() {
        let yaml = "chat:\n  default_type: poetry\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let mut config = Config::default();
        config.server.base_url = "https://chat.example.com/app/".to_string();
        assert_eq!(
            config.endpoint("/api/chats").unwrap().as_str(),
            "https://chat.example.com/app/api/chats"
        );
        assert_eq!(
            config.events_url().unwrap().as_str(),
            "https://chat.example.com/app/events"
        );
    }

    #[test]
    fn test_state_dir_prefers_configured() {
        let mut config = Config::default();
        config.chat.state_dir = Some(PathBuf::from("/tmp/chatwire-state"));
        assert_eq!(
            config.state_dir(),
            Some(PathBuf::from("/tmp/chatwire-state"))
        );
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        clear_env();
        let config = Config::load("nonexistent.yaml", &cli(None)).unwrap();
        assert_eq!(config.server.base_url, "http://localhost:5000");
    }

    #[test]
    #[serial]
    fn test_load_reads_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  events_path: /socket\n").unwrap();

        let config = Config::load(path.to_str().unwrap(), &cli(None)).unwrap();
        assert_eq!(config.server.events_path, "/socket");
    }

    #[test]
    #[serial]
    fn test_load_rejects_malformed_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [unterminated").unwrap();

        let err = Config::load(path.to_str().unwrap(), &cli(None)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatwireError>(),
            Some(ChatwireError::Yaml(_))
        ));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_load_unreadable_file_is_io_error() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();

        let err = Config::load(dir.path().to_str().unwrap(), &cli(None)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatwireError>(),
            Some(ChatwireError::Io(_))
        ));
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        clear_env();
        std::env::set_var("CHATWIRE_BASE_URL", "http://env.example:8080");
        std::env::set_var("CHATWIRE_EVENTS_PATH", "/stream");
        std::env::set_var("CHATWIRE_REQUEST_TIMEOUT", "45");
        std::env::set_var("CHATWIRE_CHAT_TYPE", "music");
        std::env::set_var("CHATWIRE_STATE_DIR", "/var/lib/chatwire");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.server.base_url, "http://env.example:8080");
        assert_eq!(config.server.events_path, "/stream");
        assert_eq!(config.server.request_timeout_seconds, 45);
        assert_eq!(config.chat.default_type, ChatType::Music);
        assert_eq!(
            config.chat.state_dir,
            Some(PathBuf::from("/var/lib/chatwire"))
        );
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_ignores_invalid_values() {
        clear_env();
        std::env::set_var("CHATWIRE_REQUEST_TIMEOUT", "soon");
        std::env::set_var("CHATWIRE_CHAT_TYPE", "poetry");

        let mut config = Config::default();
        config.apply_env_vars();
        clear_env();

        assert_eq!(config.server.request_timeout_seconds, 30);
        assert_eq!(config.chat.default_type, ChatType::General);
    }

    #[test]
    #[serial]
    fn test_cli_server_overrides_env() {
        clear_env();
        std::env::set_var("CHATWIRE_BASE_URL", "http://env.example");
        let config = Config::load("nonexistent.yaml", &cli(Some("http://cli.example"))).unwrap();
        clear_env();
        assert_eq!(config.server.base_url, "http://cli.example");
    }
}
