//! Speech-to-text input.
//!
//! Recognition is delegated to an external command that records, transcribes
//! and prints the transcript on stdout (for example a whisper wrapper).

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::core::config::AppConfig;
use crate::core::error::VoiceError;

const LISTEN_TIMEOUT: Duration = Duration::from_secs(60);

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Capture one utterance and return its transcript.
    async fn listen(&self) -> Result<String, VoiceError>;

    /// Whether `listen` can succeed at all on this machine.
    fn is_available(&self) -> bool {
        true
    }
}

pub struct CommandRecognizer {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandRecognizer {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            argv,
            timeout: LISTEN_TIMEOUT,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.voice_command.clone().unwrap_or_default())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn is_available(&self) -> bool {
        !self.argv.is_empty()
    }

    async fn listen(&self) -> Result<String, VoiceError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(VoiceError::Unsupported);
        };

        tracing::debug!(program = %program, "listening");
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(program).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| VoiceError::Failed(format!("timed out after {}s", self.timeout.as_secs_f32())))?
        .map_err(|e| VoiceError::Failed(format!("{program}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            let detail = stderr.trim();
            return Err(VoiceError::Failed(if detail.is_empty() {
                format!("exit code {code}")
            } else {
                format!("exit code {code}: {detail}")
            }));
        }

        let transcript = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if transcript.is_empty() {
            return Err(VoiceError::NoSpeechDetected);
        }
        tracing::debug!(chars = transcript.len(), "transcript received");
        Ok(transcript)
    }
}
