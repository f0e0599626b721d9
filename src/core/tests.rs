use super::config::*;
use super::error::*;
use super::message::*;
use std::collections::HashMap;

#[test]
fn test_message_creation() {
    let msg = Message::new_user("Hello world");
    assert_eq!(msg.role, Role::User);
    assert_eq!(msg.content, "Hello world");
    assert!(!msg.id.is_empty());

    let other = Message::new_user("Hello world");
    assert_ne!(msg.id, other.id);
}

#[test]
fn test_message_to_history() {
    let msg = Message::new_assistant("Hi there");
    let entry = msg.to_history();
    assert_eq!(entry.role, WireRole::Assistant);
    assert_eq!(entry.content, "Hi there");
}

#[test]
fn test_history_entry_serialization() {
    let entries = vec![HistoryEntry::user("a"), HistoryEntry::assistant("b")];
    let json = serde_json::to_value(&entries).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"role": "user", "content": "a"},
            {"role": "assistant", "content": "b"},
        ])
    );
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();
    assert_eq!(config.gateway_url, "http://127.0.0.1:18789");
    assert!(config.stream);
    assert!(!config.has_api_token());
    assert_eq!(config.theme, Theme::Dark);
    assert_eq!(
        config.endpoint("/v1/chat/completions"),
        "http://127.0.0.1:18789/v1/chat/completions"
    );
}

#[test]
fn test_endpoint_trims_trailing_slash() {
    let config = AppConfig {
        gateway_url: "http://localhost:8080/api/".into(),
        ..Default::default()
    };
    assert_eq!(config.endpoint("/gateway/call"), "http://localhost:8080/api/gateway/call");
}

#[test]
fn test_config_file_and_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jenny.json");
    std::fs::write(
        &path,
        r#"{"gateway_url": "http://gw:1", "api_token": "tok", "stream": false, "theme": "light",
            "headers": {"x-agent-id": "main"}}"#,
    )
    .unwrap();

    let file_config = read_config_file(&path).unwrap().unwrap();
    let mut config = AppConfig::default();
    merge_config(&mut config, file_config);

    assert_eq!(config.gateway_url, "http://gw:1");
    assert_eq!(config.api_token.as_deref(), Some("tok"));
    assert!(!config.stream);
    assert_eq!(config.theme, Theme::Light);
    assert_eq!(config.headers.get("x-agent-id").map(String::as_str), Some("main"));
    // Untouched fields keep their defaults
    assert_eq!(config.model, "default");
}

#[test]
fn test_later_file_restores_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let global = dir.path().join("config.json");
    let local = dir.path().join("jenny.json");
    std::fs::write(&global, r#"{"stream": false, "theme": "light", "model": "big"}"#).unwrap();
    std::fs::write(&local, r#"{"stream": true, "theme": "dark"}"#).unwrap();

    let mut config = AppConfig::default();
    merge_config(&mut config, read_config_file(&global).unwrap().unwrap());
    merge_config(&mut config, read_config_file(&local).unwrap().unwrap());

    assert!(config.stream);
    assert_eq!(config.theme, Theme::Dark);
    // Absent keys leave the earlier value alone
    assert_eq!(config.model, "big");
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_config_file(&dir.path().join("nope.json")).unwrap().is_none());
}

#[test]
fn test_invalid_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("jenny.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(read_config_file(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_config_reads_local_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("jenny.json"), r#"{"model": "local-model"}"#).unwrap();
    let config = load_config(Some(dir.path().to_path_buf())).unwrap();
    // JENNY_MODEL in the environment would win; only assert when it is unset
    if std::env::var("JENNY_MODEL").is_err() {
        assert_eq!(config.model, "local-model");
    }
}

#[test]
fn test_env_overrides_file() {
    let mut config = AppConfig {
        gateway_url: "http://from-file".into(),
        ..Default::default()
    };
    let env: HashMap<&str, &str> = HashMap::from([
        ("JENNY_GATEWAY_URL", "http://from-env"),
        ("JENNY_API_TOKEN", "secret"),
        ("JENNY_MODEL", "  "),
        ("JENNY_VOICE_COMMAND", "whisper-cli --once"),
    ]);
    apply_env(&mut config, |k| env.get(k).map(|v| v.to_string()));

    assert_eq!(config.gateway_url, "http://from-env");
    assert_eq!(config.api_token.as_deref(), Some("secret"));
    // Blank values are ignored
    assert_eq!(config.model, "default");
    assert_eq!(
        config.voice_command,
        Some(vec!["whisper-cli".to_string(), "--once".to_string()])
    );
}

#[test]
fn test_theme_toggle() {
    assert_eq!(Theme::Dark.toggled(), Theme::Light);
    assert_eq!(Theme::Light.toggled(), Theme::Dark);
    assert!(Theme::Dark.is_dark());
}

#[test]
fn test_error_display() {
    let err = GatewayError::Status {
        status: 502,
        body: "bad gateway".into(),
    };
    assert_eq!(err.to_string(), "API error (502): bad gateway");

    let top: JennyError = err.into();
    assert!(top.to_string().starts_with("Gateway error:"));
    assert_eq!(GatewayError::Cancelled.to_string(), "Cancelled");
}
