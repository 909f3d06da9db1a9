//! Parse model replies into structured intents
//!
//! The model is asked for a JSON object shaped like [`Intent`]. Replies often
//! arrive wrapped in a markdown fence or with chatter around the object, so
//! the text is cleaned before deserialising. Any failure here is recoverable:
//! the resolver falls back to the keyword rules.

use crate::core::error::{Result, VoxError};
use crate::llm::context::PromptContext;
use crate::llm::LanguageBackend;
use serde::{Deserialize, Serialize};

/// Free-form action parameters as produced by the model
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Structured interpretation of one utterance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    /// The type of action requested
    pub action: IntentAction,
    /// Action-specific data (`app`, `command`, `operation`, `to`, ...)
    #[serde(default)]
    pub parameters: Parameters,
    /// Natural-language reply spoken back to the user
    #[serde(default)]
    pub response: String,
    /// Whether the user should approve before the action runs
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Parser's confidence in the interpretation (0.0 - 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Kinds of action the dispatcher can run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IntentAction {
    /// Launch an application
    #[serde(rename = "app")]
    AppOpen,
    /// Screenshot, typing, clicking
    #[serde(rename = "system")]
    SystemCmd,
    /// Read the wall clock
    #[serde(rename = "time")]
    Time,
    /// Compose or manage email
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "calendar")]
    Calendar,
    /// File operations
    #[serde(rename = "document")]
    Document,
    #[serde(rename = "browser")]
    Browser,
    /// Nothing to execute
    #[serde(rename = "none")]
    None,
}

impl IntentAction {
    /// Wire name used in prompts and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAction::AppOpen => "app",
            IntentAction::SystemCmd => "system",
            IntentAction::Time => "time",
            IntentAction::Email => "email",
            IntentAction::Calendar => "calendar",
            IntentAction::Document => "document",
            IntentAction::Browser => "browser",
            IntentAction::None => "none",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "app" => Some(IntentAction::AppOpen),
            "system" => Some(IntentAction::SystemCmd),
            "time" => Some(IntentAction::Time),
            "email" => Some(IntentAction::Email),
            "calendar" => Some(IntentAction::Calendar),
            "document" => Some(IntentAction::Document),
            "browser" => Some(IntentAction::Browser),
            "none" => Some(IntentAction::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for IntentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            action: IntentAction::None,
            parameters: Parameters::new(),
            response: String::new(),
            requires_confirmation: false,
            confidence: None,
        }
    }
}

impl Intent {
    pub fn new(action: IntentAction, response: impl Into<String>) -> Self {
        Self {
            action,
            response: response.into(),
            ..Self::default()
        }
    }

    /// An intent that executes nothing and only speaks `response`
    pub fn none(response: impl Into<String>) -> Self {
        Self::new(IntentAction::None, response)
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// String parameter, if present and a string
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    pub fn has_action(&self) -> bool {
        self.action != IntentAction::None
    }

    /// Verb phrase for what executing this intent would do, e.g.
    /// "open calculator" or "delete notes.txt"
    pub fn describe(&self) -> String {
        let text = |key: &str| self.param_str(key).map(str::trim).filter(|s| !s.is_empty());
        match self.action {
            IntentAction::AppOpen => match text("app") {
                Some(app) => format!("open {}", app),
                None => "open an application".into(),
            },
            IntentAction::SystemCmd => match text("command").map(str::to_lowercase).as_deref() {
                Some("screenshot") => "take a screenshot".into(),
                Some("type") => match text("text") {
                    Some(t) => format!("type \"{}\"", t),
                    None => "type some text".into(),
                },
                Some("click") => "click the screen".into(),
                Some("active_window") | Some("window") => "check the active window".into(),
                Some(other) => format!("run the {} command", other),
                None => "run a system command".into(),
            },
            IntentAction::Time => "check the time".into(),
            IntentAction::Email => {
                let operation = text("operation").map(str::to_lowercase);
                let target = text("to").map(|to| format!(" to {}", to)).unwrap_or_default();
                match operation.as_deref() {
                    Some("send") => format!("send an email{}", target),
                    None | Some("compose") | Some("open") => format!("compose an email{}", target),
                    Some(other) => format!("{} email", other),
                }
            }
            IntentAction::Document => {
                let operation = text("operation").map(str::to_lowercase);
                let operation = operation.as_deref().unwrap_or("open");
                match (text("filePath"), text("destination")) {
                    (Some(path), Some(dest)) => format!("{} {} to {}", operation, path, dest),
                    (Some(path), None) => format!("{} {}", operation, path),
                    (None, _) => format!("{} a document", operation),
                }
            }
            IntentAction::Calendar => "update your calendar".into(),
            IntentAction::Browser => "use the browser".into(),
            IntentAction::None => "do that".into(),
        }
    }
}

/// Ask the backend to interpret `utterance` and parse its reply
///
/// # Arguments
/// * `backend` - The language backend to query
/// * `utterance` - What the user said
/// * `context` - Recent turns and draft state for disambiguation
///
/// # Returns
/// The parsed intent, or a `Backend`/`Parse` error for the caller to recover from
pub async fn request_intent(
    backend: &dyn LanguageBackend,
    utterance: &str,
    context: &PromptContext,
) -> Result<Intent> {
    let prompt = context.build_prompt(utterance);
    let response = backend.generate(&prompt).await?;
    parse_intent(&response)
}

/// Parse a raw model reply into an [`Intent`]
pub fn parse_intent(response: &str) -> Result<Intent> {
    let cleaned = strip_code_fence(response);
    match serde_json::from_str::<Intent>(cleaned) {
        Ok(intent) => Ok(intent),
        Err(first_err) => {
            // chatter around the object: retry on the outermost braces
            let json_str = extract_json(cleaned)?;
            serde_json::from_str::<Intent>(json_str).map_err(|e| {
                VoxError::Parse(format!(
                    "Failed to parse intent: {} / {} - Response: {}",
                    first_err, e, response
                ))
            })
        }
    }
}

/// Remove a surrounding markdown code fence, with or without a language tag
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the language tag, if any, up to the end of the opening line
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim().trim_end_matches("```").trim()
}

/// Extract JSON object from LLM response (handles surrounding text)
fn extract_json(response: &str) -> Result<&str> {
    let start = response
        .find('{')
        .ok_or_else(|| VoxError::Parse("No JSON found in response".into()))?;
    let end = response
        .rfind('}')
        .ok_or_else(|| VoxError::Parse("No closing brace found in response".into()))?;
    if end < start {
        return Err(VoxError::Parse("Unbalanced braces in response".into()));
    }
    Ok(&response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fence_with_language_tag() {
        let reply = "```json\n{\"action\": \"time\"}\n```";
        assert_eq!(strip_code_fence(reply), "{\"action\": \"time\"}");
    }

    #[test]
    fn test_strip_fence_without_tag() {
        let reply = "```\n{\"action\": \"time\"}\n```";
        assert_eq!(strip_code_fence(reply), "{\"action\": \"time\"}");
    }

    #[test]
    fn test_strip_fence_single_line() {
        assert_eq!(
            strip_code_fence("```json {\"action\": \"none\"} ```"),
            "{\"action\": \"none\"}"
        );
    }

    #[test]
    fn test_strip_fence_leaves_plain_text() {
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_full_intent() {
        let reply = r#"```json
{
  "action": "app",
  "parameters": {"app": "chrome"},
  "response": "Opening Chrome browser.",
  "requiresConfirmation": false,
  "confidence": 0.9
}
```"#;
        let intent = parse_intent(reply).unwrap();
        assert_eq!(intent.action, IntentAction::AppOpen);
        assert_eq!(intent.param_str("app"), Some("chrome"));
        assert_eq!(intent.response, "Opening Chrome browser.");
        assert!(!intent.requires_confirmation);
        assert!((intent.confidence.unwrap() - 0.9).abs() < 0.001);
    }

    #[test]
    fn test_parse_minimal_intent_defaults() {
        let intent = parse_intent(r#"{"action": "time"}"#).unwrap();
        assert_eq!(intent.action, IntentAction::Time);
        assert!(intent.parameters.is_empty());
        assert!(intent.response.is_empty());
        assert!(intent.confidence.is_none());
    }

    #[test]
    fn test_parse_with_surrounding_text() {
        let reply = r#"Sure! {"action": "system", "parameters": {"command": "screenshot"}, "response": "Taking a screenshot now."} Anything else?"#;
        let intent = parse_intent(reply).unwrap();
        assert_eq!(intent.action, IntentAction::SystemCmd);
        assert_eq!(intent.param_str("command"), Some("screenshot"));
    }

    #[test]
    fn test_parse_plain_text_fails() {
        let result = parse_intent("I don't understand that command");
        assert!(matches!(result, Err(VoxError::Parse(_))));
    }

    #[test]
    fn test_parse_unknown_action_fails() {
        assert!(parse_intent(r#"{"action": "teleport"}"#).is_err());
    }

    #[test]
    fn test_intent_action_serialization() {
        let json = serde_json::to_string(&IntentAction::AppOpen).unwrap();
        assert_eq!(json, "\"app\"");
        let action: IntentAction = serde_json::from_str("\"document\"").unwrap();
        assert_eq!(action, IntentAction::Document);
    }

    #[test]
    fn test_from_wire_matches_serde_names() {
        for action in [
            IntentAction::AppOpen,
            IntentAction::SystemCmd,
            IntentAction::Time,
            IntentAction::Email,
            IntentAction::Calendar,
            IntentAction::Document,
            IntentAction::Browser,
            IntentAction::None,
        ] {
            assert_eq!(IntentAction::from_wire(action.as_str()), Some(action));
        }
        assert_eq!(IntentAction::from_wire("bogus"), None);
    }

    #[test]
    fn test_intent_serializes_camel_case() {
        let intent = Intent::new(IntentAction::Time, "Checking the time.");
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["requiresConfirmation"], false);
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_describe_uses_parameters() {
        let app = Intent::new(IntentAction::AppOpen, "").with_param("app", "calculator");
        assert_eq!(app.describe(), "open calculator");

        let delete = Intent::new(IntentAction::Document, "")
            .with_param("operation", "delete")
            .with_param("filePath", "notes.txt");
        assert_eq!(delete.describe(), "delete notes.txt");

        let copy = Intent::new(IntentAction::Document, "")
            .with_param("operation", "copy")
            .with_param("filePath", "a.txt")
            .with_param("destination", "b.txt");
        assert_eq!(copy.describe(), "copy a.txt to b.txt");

        let send = Intent::new(IntentAction::Email, "")
            .with_param("operation", "send")
            .with_param("to", "a@b.com");
        assert_eq!(send.describe(), "send an email to a@b.com");
    }

    #[test]
    fn test_describe_without_parameters() {
        assert_eq!(Intent::new(IntentAction::AppOpen, "").describe(), "open an application");
        assert_eq!(
            Intent::new(IntentAction::SystemCmd, "")
                .with_param("command", "screenshot")
                .describe(),
            "take a screenshot"
        );
        assert_eq!(Intent::new(IntentAction::Email, "").describe(), "compose an email");
        assert_eq!(Intent::new(IntentAction::Document, "").describe(), "open a document");
    }
}
