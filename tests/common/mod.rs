use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chatwire::api::ChatApi;
use chatwire::reconciler::Effect;
use chatwire::ChatView;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// View that records every effect it is given.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct RecordingView {
    pub effects: Vec<Effect>,
}

impl ChatView for RecordingView {
    fn apply(&mut self, effect: &Effect) {
        self.effects.push(effect.clone());
    }
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn api_for(server: &MockServer) -> ChatApi {
    ChatApi::with_base_url(&server.uri(), Duration::from_secs(5)).expect("failed to build api")
}

/// Serve `body` as the history of `chat_id`.
#[allow(dead_code)]
pub async fn mount_history(server: &MockServer, chat_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/chats/{}/messages", chat_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
