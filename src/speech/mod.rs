//! Text-to-speech output

use crate::core::config::{SpeechConfig, VoiceOutput};
use crate::core::error::{Result, VoxError};
use crate::platform::run_command;
use async_trait::async_trait;
use std::sync::Arc;

/// Speaks assistant replies. The pipeline awaits `speak` only to keep replies
/// in order; a failure is logged and never aborts a command.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Writes replies to stdout
#[derive(Debug, Default)]
pub struct ConsoleSpeaker;

#[async_trait]
impl TextToSpeech for ConsoleSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("assistant> {}", text);
        Ok(())
    }
}

/// Speaks through the macOS `say` command
#[derive(Debug, Default)]
pub struct SaySpeaker;

#[async_trait]
impl TextToSpeech for SaySpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(VoxError::Executor("Cannot speak empty text".into()));
        }
        run_command("say", &[text]).await?;
        Ok(())
    }
}

pub fn speaker_for(config: &SpeechConfig) -> Arc<dyn TextToSpeech> {
    match config.voice {
        VoiceOutput::Console => Arc::new(ConsoleSpeaker),
        VoiceOutput::Say => Arc::new(SaySpeaker),
    }
}

/// Speak and log instead of propagating failures
pub async fn speak_or_log(tts: &dyn TextToSpeech, text: &str) {
    if let Err(e) = tts.speak(text).await {
        tracing::warn!("Text-to-speech failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_say_rejects_empty_text() {
        assert!(SaySpeaker.speak("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_console_speaker_succeeds() {
        assert!(ConsoleSpeaker.speak("hello").await.is_ok());
    }
}
