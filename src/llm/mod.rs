//! Language-model side of intent resolution: backend client, prompt context,
//! reply parsing and the keyword fallback used when the model is unusable.

pub mod client;
pub mod context;
pub mod fallback;
pub mod parser;

use crate::core::error::Result;
use async_trait::async_trait;

pub use client::LlmClient;
pub use context::PromptContext;
pub use fallback::{fallback, FallbackRule};
pub use parser::{Intent, IntentAction, Parameters};

/// A generative-language backend. Implementations may fail with
/// `VoxError::Backend`; they give no guarantee that the text is valid JSON.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}
