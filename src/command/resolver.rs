//! Intent resolution - utterance plus session context to a structured intent
//!
//! The language backend is tried first. Backend errors, timeouts and
//! unparseable replies all degrade to the keyword fallback, so resolution
//! never fails.

use crate::command::session::SessionContext;
use crate::llm::context::PromptContext;
use crate::llm::fallback::fallback;
use crate::llm::parser::{request_intent, Intent};
use crate::llm::LanguageBackend;
use std::sync::Arc;
use std::time::Duration;

/// Which path produced an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Backend,
    Fallback,
}

/// Result of resolving one utterance
#[derive(Debug, Clone)]
pub struct IntentResolution {
    pub intent: Intent,
    pub source: IntentSource,
}

impl IntentResolution {
    fn fallback(utterance: &str) -> Self {
        Self {
            intent: fallback(utterance),
            source: IntentSource::Fallback,
        }
    }
}

/// Resolves utterances to intents
pub struct IntentResolver {
    backend: Option<Arc<dyn LanguageBackend>>,
    timeout: Duration,
    history_window: usize,
}

impl IntentResolver {
    pub fn new(backend: Arc<dyn LanguageBackend>, timeout: Duration, history_window: usize) -> Self {
        Self {
            backend: Some(backend),
            timeout,
            history_window,
        }
    }

    /// Resolver that only ever uses the keyword fallback
    pub fn without_backend(history_window: usize) -> Self {
        Self {
            backend: None,
            timeout: Duration::ZERO,
            history_window,
        }
    }

    pub fn has_backend(&self) -> bool {
        self.backend.is_some()
    }

    /// Resolve `utterance` in the context of `session`
    pub async fn resolve(&self, utterance: &str, session: &SessionContext) -> IntentResolution {
        let Some(backend) = &self.backend else {
            tracing::debug!("No language backend, using keyword fallback");
            return IntentResolution::fallback(utterance);
        };

        let context =
            PromptContext::from_session(session.history.iter(), self.history_window, &session.email);

        match tokio::time::timeout(
            self.timeout,
            request_intent(backend.as_ref(), utterance, &context),
        )
        .await
        {
            Ok(Ok(intent)) => {
                tracing::debug!("Backend intent: {} {:?}", intent.action, intent.parameters);
                IntentResolution {
                    intent,
                    source: IntentSource::Backend,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!("Intent resolution failed ({}), using keyword fallback", e);
                IntentResolution::fallback(utterance)
            }
            Err(_) => {
                tracing::warn!(
                    "Language backend timed out after {:?}, using keyword fallback",
                    self.timeout
                );
                IntentResolution::fallback(utterance)
            }
        }
    }
}
