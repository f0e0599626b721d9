use thiserror::Error;

#[derive(Error, Debug)]
pub enum JennyError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Render error: {0}")]
    Render(#[from] ChartRenderError),
}

#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Gateway rejected call: {0}")]
    Api(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Http(e.to_string())
    }
}

/// A `json:chart` fence whose body is not a usable chart directive.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartParseError {
    #[error("invalid chart JSON: {0}")]
    Json(String),

    #[error("chart directive has no `data` field")]
    MissingData,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChartRenderError {
    #[error("malformed series: {0}")]
    Series(String),

    #[error("nothing to draw")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoiceError {
    #[error("Voice input is not supported in this environment")]
    Unsupported,

    #[error("No speech detected")]
    NoSpeechDetected,

    #[error("Voice capture failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file error: {0}")]
    File(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
