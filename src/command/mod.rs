//! Command execution pipeline
//!
//! Turns an utterance into an outcome:
//! utterance -> IntentResolver -> Intent -> ActionDispatcher -> ActionResult

pub mod dispatcher;
pub mod documents;
pub mod email;
pub mod resolver;
pub mod result;
pub mod session;

pub use dispatcher::ActionDispatcher;
pub use email::EmailComposeContext;
pub use resolver::{IntentResolution, IntentResolver, IntentSource};
pub use result::ActionResult;
pub use session::{ConversationHistory, PendingConfirmation, SessionContext, SessionStore};

use crate::llm::parser::Parameters;

/// Trimmed, non-empty string parameter
pub(crate) fn text_param(params: &Parameters, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
