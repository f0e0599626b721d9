use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::error::ConfigError;

/// Local gateway address used when nothing else is configured
const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:18789";

const DEFAULT_MODEL: &str = "default";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn is_dark(self) -> bool {
        self == Theme::Dark
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the chat-completion gateway
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Static bearer token attached to every gateway call
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Extra headers sent with every gateway call
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Ask the gateway to stream replies
    #[serde(default = "default_stream")]
    pub stream: bool,

    #[serde(default)]
    pub theme: Theme,

    /// Command that records speech and prints the transcript on stdout
    #[serde(default)]
    pub voice_command: Option<Vec<String>>,

    #[serde(default)]
    pub debug: bool,
}

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_stream() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway_url: default_gateway_url(),
            api_token: None,
            model: default_model(),
            headers: BTreeMap::new(),
            stream: default_stream(),
            theme: Theme::default(),
            voice_command: None,
            debug: false,
        }
    }
}

/// Load configuration: global file, then `./jenny.json`, then environment.
pub fn load_config(working_dir: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let wd = working_dir.unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let mut config = AppConfig::default();

    if let Some(config_dir) = dirs::config_dir() {
        let global_path = config_dir.join("jenny").join("config.json");
        if let Some(file_config) = read_config_file(&global_path)? {
            merge_config(&mut config, file_config);
        }
    }

    if let Some(file_config) = read_config_file(&wd.join("jenny.json"))? {
        merge_config(&mut config, file_config);
    }

    apply_env(&mut config, |key| std::env::var(key).ok());

    tracing::debug!(gateway = %config.gateway_url, model = %config.model, "config loaded");
    Ok(config)
}

/// One config file. Every field is optional so that a later file can set
/// a value back to its default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub gateway_url: Option<String>,
    pub api_token: Option<String>,
    pub model: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub stream: Option<bool>,
    pub theme: Option<Theme>,
    pub voice_command: Option<Vec<String>>,
    pub debug: Option<bool>,
}

pub fn read_config_file(path: &Path) -> Result<Option<ConfigFile>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::File(format!("{}: {e}", path.display())))?;
    let parsed: ConfigFile = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {e}", path.display())))?;
    Ok(Some(parsed))
}

pub fn merge_config(base: &mut AppConfig, overlay: ConfigFile) {
    if let Some(url) = overlay.gateway_url {
        base.gateway_url = url;
    }
    if overlay.api_token.is_some() {
        base.api_token = overlay.api_token;
    }
    if let Some(model) = overlay.model {
        base.model = model;
    }
    base.headers.extend(overlay.headers);
    if let Some(stream) = overlay.stream {
        base.stream = stream;
    }
    if let Some(theme) = overlay.theme {
        base.theme = theme;
    }
    if overlay.voice_command.is_some() {
        base.voice_command = overlay.voice_command;
    }
    if let Some(debug) = overlay.debug {
        base.debug = debug;
    }
}

/// Environment overrides. `lookup` is `std::env::var` outside of tests.
pub fn apply_env(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = non_empty("JENNY_GATEWAY_URL") {
        config.gateway_url = url;
    }
    if let Some(token) = non_empty("JENNY_API_TOKEN") {
        config.api_token = Some(token);
    }
    if let Some(model) = non_empty("JENNY_MODEL") {
        config.model = model;
    }
    if let Some(cmd) = non_empty("JENNY_VOICE_COMMAND") {
        let argv: Vec<String> = cmd.split_whitespace().map(str::to_string).collect();
        config.voice_command = Some(argv);
    }
}

impl AppConfig {
    pub fn has_api_token(&self) -> bool {
        self.api_token.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.gateway_url.trim_end_matches('/'), path)
    }
}
