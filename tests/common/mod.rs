use metaretrieval::config::{Config, StorageConfig};
use metaretrieval::storage::SqliteConversationStore;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[allow(dead_code)]
pub fn create_temp_store() -> (SqliteConversationStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("history.db");
    let store = SqliteConversationStore::new_with_path(db_path)
        .expect("failed to create sqlite store with path");
    (store, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Configuration pointing at a mock endpoint and a database in `dir`
#[allow(dead_code)]
pub fn test_config(endpoint_base: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.endpoint.url = format!("{}/v1/chat/completions", endpoint_base);
    config.endpoint.api_key = Some("test-key".to_string());
    config.endpoint.timeout_seconds = 5;
    config.storage = StorageConfig {
        path: Some(dir.path().join("history.db")),
    };
    config
}

/// Success body in the endpoint's chat-completion shape
#[allow(dead_code)]
pub fn completion_body(content: &str) -> Value {
    json!({
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

/// `n` space-separated words
#[allow(dead_code)]
pub fn words(n: usize) -> String {
    vec!["word"; n].join(" ")
}
