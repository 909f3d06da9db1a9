//! Gather conversation context for LLM prompts
//!
//! Builds the prompt sent to the language backend: a fixed instruction that
//! enumerates the action kinds and their parameters, the recent conversation
//! turns, the state of any email being composed, and the current utterance.

use crate::command::email::EmailComposeContext;
use crate::core::types::ConversationTurn;

/// Context for LLM prompts
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Most recent turns, oldest first
    pub recent_turns: Vec<ConversationTurn>,
    /// Email draft being filled across turns, if any
    pub email_draft: Option<EmailDraftSummary>,
}

/// Slots of an in-progress email, as shown to the model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailDraftSummary {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl PromptContext {
    /// Build a context from session state
    ///
    /// # Arguments
    /// * `turns` - Conversation turns, oldest first
    /// * `window` - Maximum number of turns to include
    /// * `email` - The session's compose context
    pub fn from_session<'a>(
        turns: impl DoubleEndedIterator<Item = &'a ConversationTurn>,
        window: usize,
        email: &EmailComposeContext,
    ) -> Self {
        let mut recent_turns: Vec<ConversationTurn> = turns.rev().take(window).cloned().collect();
        recent_turns.reverse();

        let email_draft = email.is_composing.then(|| EmailDraftSummary {
            to: email.to.clone(),
            subject: email.subject.clone(),
            body: email.body.clone(),
        });

        Self {
            recent_turns,
            email_draft,
        }
    }

    /// Create an empty context for testing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Generate the context block that follows the instruction
    pub fn summary(&self) -> String {
        let mut s = String::new();

        if !self.recent_turns.is_empty() {
            s.push_str("\nConversation History:\n");
            for turn in &self.recent_turns {
                s.push_str(&turn.render());
                s.push('\n');
            }
        }

        if let Some(draft) = &self.email_draft {
            s.push_str("\nEmail being composed:\n");
            s.push_str(&format!("- to: {}\n", draft.to.as_deref().unwrap_or("(missing)")));
            s.push_str(&format!(
                "- subject: {}\n",
                draft.subject.as_deref().unwrap_or("(missing)")
            ));
            s.push_str(&format!("- body: {}\n", draft.body.as_deref().unwrap_or("(empty)")));
            s.push_str(
                "If the user supplies a recipient, subject or body, answer with an email \
                 compose action carrying only the new fields.\n",
            );
        }

        s
    }

    /// Full prompt for `utterance`
    pub fn build_prompt(&self, utterance: &str) -> String {
        format!(
            "{}\n{}\nUser said: \"{}\"\n\nRespond ONLY with valid JSON.",
            INTENT_INSTRUCTION,
            self.summary(),
            utterance
        )
    }
}

/// Instruction describing the action vocabulary
const INTENT_INSTRUCTION: &str = r#"You are a desktop voice assistant that controls the computer on the user's behalf.
Be flexible with natural language and map each request to exactly one action.

AVAILABLE ACTIONS:
- app: open an application. parameters: {"app": "chrome|firefox|notepad|calculator|word|excel|outlook|explorer|<name>"}
- system: screen and input control. parameters: {"command": "screenshot"} | {"command": "type", "text": "..."} | {"command": "click", "x": 0, "y": 0}
- time: report the current time. parameters: {}
- email: email tasks. parameters: {"operation": "compose|send|read|search|reply|draft|cancel", "to": "...", "subject": "...", "body": "...", "searchQuery": "...", "messageId": "..."}
- calendar: schedules, events and meetings. parameters: free-form
- document: file operations. parameters: {"operation": "open|search|create|list|delete|copy|move", "filePath": "...", "searchTerm": "...", "content": "...", "directory": "...", "destination": "..."}
- browser: web automation. parameters: free-form
- none: nothing to execute (small talk, unclear requests). parameters: {}

Examples:
"I want to send an email" -> {"action": "email", "parameters": {"operation": "compose"}, "response": "Happy to help with an email. Who is it for, and what's the subject?", "requiresConfirmation": false}
"open email" -> {"action": "email", "parameters": {"operation": "compose"}, "response": "Opening a new email.", "requiresConfirmation": false}
"open chrome" -> {"action": "app", "parameters": {"app": "chrome"}, "response": "Opening Chrome.", "requiresConfirmation": false}
"take a screenshot" -> {"action": "system", "parameters": {"command": "screenshot"}, "response": "Taking a screenshot now.", "requiresConfirmation": false}
"what time is it" -> {"action": "time", "parameters": {}, "response": "Let me check the time.", "requiresConfirmation": false}
"delete notes.txt" -> {"action": "document", "parameters": {"operation": "delete", "filePath": "notes.txt"}, "response": "Deleting notes.txt.", "requiresConfirmation": true}

Set "requiresConfirmation" to true only for destructive operations such as deleting or moving files.

OUTPUT FORMAT (JSON only, no explanation):
{
  "action": "app|system|time|email|calendar|document|browser|none",
  "parameters": { },
  "response": "short natural reply confirming what you will do",
  "requiresConfirmation": false,
  "confidence": 0.0-1.0
}
"#;
