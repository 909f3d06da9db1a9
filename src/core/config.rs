//! Assistant configuration with documented defaults
//!
//! Values come from an optional TOML file, then environment overrides for the
//! language backend, then `validate()`. Every field has a default so an empty
//! or missing file produces a working text-only assistant.

use crate::core::error::{Result, VoxError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub email: EmailConfig,
    pub paths: PathsConfig,
    pub speech: SpeechConfig,
}

/// Generative backend settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Endpoint; the wire format is detected from the host name
    pub api_url: String,
    pub model: String,
    /// Without a key the resolver runs on the keyword fallback only
    pub api_key: Option<String>,
    /// Upper bound on a single backend call
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".into(),
            model: "claude-3-haiku-20240307".into(),
            api_key: None,
            timeout_secs: 20,
        }
    }
}

/// How an intent flagged `requiresConfirmation` is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// Park the intent until the user answers
    Explicit,
    /// Announce, wait `confirmation_delay_ms`, then proceed
    Auto,
}

/// Command pipeline behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Re-arm listening after every command instead of waiting for a wake signal
    pub continuous: bool,
    /// Final transcripts containing one of these abort the command
    pub cancel_phrases: Vec<String>,
    /// Replies accepted as "yes" while awaiting confirmation
    pub affirmative_phrases: Vec<String>,
    /// Number of conversation turns kept for prompt context
    pub history_window: usize,
    /// Live sessions kept before the least recently used is evicted
    pub max_sessions: usize,
    /// Delay before listening restarts after a transcription error
    pub restart_backoff_ms: u64,
    pub confirmation: ConfirmationMode,
    pub confirmation_delay_ms: u64,
    /// A pending confirmation older than this is dropped as "not confirmed"
    pub confirmation_timeout_secs: u64,
    /// Spoken when the wake signal arrives
    pub wake_acknowledgment: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            cancel_phrases: vec!["never mind".into(), "nevermind".into()],
            affirmative_phrases: vec![
                "yes".into(),
                "yeah".into(),
                "yep".into(),
                "sure".into(),
                "ok".into(),
                "okay".into(),
                "proceed".into(),
                "go ahead".into(),
                "do it".into(),
                "confirm".into(),
            ],
            history_window: 10,
            max_sessions: 256,
            restart_backoff_ms: 1000,
            confirmation: ConfirmationMode::Explicit,
            confirmation_delay_ms: 1500,
            confirmation_timeout_secs: 15,
            wake_acknowledgment: "Yes?".into(),
        }
    }
}

impl PipelineConfig {
    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }

    pub fn confirmation_delay(&self) -> Duration {
        Duration::from_millis(self.confirmation_delay_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Webmail service used for compose links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebmailProvider {
    #[default]
    Gmail,
    Outlook,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub provider: WebmailProvider,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub screenshot_dir: PathBuf,
    /// Root for relative document paths, listing and search
    pub documents_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: PathBuf::from("screenshots"),
            documents_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceOutput {
    /// Print replies to stdout
    #[default]
    Console,
    /// macOS `say`
    Say,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub voice: VoiceOutput,
}

impl AssistantConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| VoxError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load from a file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VoxError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Apply `LLM_API_KEY`, `LLM_API_URL` and `LLM_MODEL`
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            if !key.trim().is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("LLM_API_URL") {
            self.llm.api_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pipeline.history_window == 0 {
            return Err("history_window must be at least 1".into());
        }

        if self.pipeline.max_sessions == 0 {
            return Err("max_sessions must be at least 1".into());
        }

        if self.pipeline.cancel_phrases.iter().all(|p| p.trim().is_empty()) {
            return Err("at least one cancel phrase is required".into());
        }

        if self.pipeline.confirmation == ConfirmationMode::Explicit
            && self.pipeline.affirmative_phrases.is_empty()
        {
            return Err("explicit confirmation needs affirmative_phrases".into());
        }

        if self.llm.timeout_secs == 0 {
            return Err("llm.timeout_secs must be positive".into());
        }

        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}
