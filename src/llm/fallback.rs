//! Deterministic keyword resolver
//!
//! Used whenever the language backend errors, times out, is not configured,
//! or returns text that does not parse. Rules are evaluated in the order of
//! [`FallbackRule::ORDER`]; the first rule whose keywords appear in the
//! lowercased utterance wins. There is no scoring.

use crate::llm::parser::{Intent, IntentAction};
use regex::Regex;
use std::sync::OnceLock;

/// Spoken when no rule matches
pub const CLARIFICATION_RESPONSE: &str = "I didn't understand that. Could you please rephrase?";

/// App launched when an open request names nothing we know
pub const DEFAULT_APP: &str = "notepad";

/// One keyword rule of the fallback table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackRule {
    Screenshot,
    EmailCompose,
    AppOpen,
    Time,
    Document,
}

/// App name and the phrases that select it, in priority order
const APP_ALIASES: &[(&str, &[&str])] = &[
    ("chrome", &["chrome", "google chrome", "browser"]),
    ("firefox", &["firefox", "mozilla"]),
    ("notepad", &["notepad", "text editor", "editor"]),
    ("calculator", &["calculator", "calc"]),
    ("word", &["word", "microsoft word", "document"]),
    ("excel", &["excel", "spreadsheet"]),
    ("gmail", &["gmail", "google mail"]),
    ("outlook", &["outlook", "microsoft outlook"]),
    ("email", &["email", "mail"]),
    ("explorer", &["explorer", "file explorer", "files"]),
];

impl FallbackRule {
    /// Evaluation order; earlier rules shadow later ones
    pub const ORDER: [FallbackRule; 5] = [
        FallbackRule::Screenshot,
        FallbackRule::EmailCompose,
        FallbackRule::AppOpen,
        FallbackRule::Time,
        FallbackRule::Document,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            FallbackRule::Screenshot => &["screenshot", "picture", "capture"],
            FallbackRule::EmailCompose => &["email", "send", "compose", "write", "message", "mail"],
            FallbackRule::AppOpen => &["open", "launch", "start"],
            FallbackRule::Time => &["time", "clock", "hour"],
            FallbackRule::Document => &["document", "file", "create"],
        }
    }

    /// Action every intent built by this rule carries
    pub fn action(&self) -> IntentAction {
        match self {
            FallbackRule::Screenshot => IntentAction::SystemCmd,
            FallbackRule::EmailCompose => IntentAction::Email,
            FallbackRule::AppOpen => IntentAction::AppOpen,
            FallbackRule::Time => IntentAction::Time,
            FallbackRule::Document => IntentAction::Document,
        }
    }

    /// `lower` must already be lowercased
    pub fn matches(&self, lower: &str) -> bool {
        self.keywords().iter().any(|k| lower.contains(k))
    }

    fn build(&self, utterance: &str) -> Intent {
        match self {
            FallbackRule::Screenshot => Intent::new(self.action(), "Taking a screenshot now.")
                .with_param("command", "screenshot"),
            FallbackRule::EmailCompose => {
                let to = extract_email_address(utterance).unwrap_or_default();
                let subject = extract_subject(utterance).unwrap_or_default();
                let body = extract_body(utterance).unwrap_or_default();

                let mut response = String::from("I'll help you with the email");
                if !to.is_empty() {
                    response.push_str(&format!(" to {}", to));
                }
                if !subject.is_empty() {
                    response.push_str(&format!(" about {}", subject));
                }
                if !body.is_empty() {
                    response.push_str(&format!(" with content: {}", body));
                }
                response.push('.');

                Intent::new(self.action(), response)
                    .with_param("operation", "compose")
                    .with_param("to", to)
                    .with_param("subject", subject)
                    .with_param("body", body)
            }
            FallbackRule::AppOpen => {
                let app = extract_app_name(utterance);
                Intent::new(
                    self.action(),
                    format!("Opening {}.", app.unwrap_or("application")),
                )
                .with_param("app", app.unwrap_or(DEFAULT_APP))
            }
            FallbackRule::Time => {
                Intent::new(self.action(), "Let me check the current time for you.")
            }
            FallbackRule::Document => {
                Intent::new(self.action(), "I'll help you create a document.")
                    .with_param("operation", "create")
            }
        }
    }
}

/// First rule matching `utterance`, if any
pub fn matching_rule(utterance: &str) -> Option<FallbackRule> {
    let lower = utterance.to_lowercase();
    FallbackRule::ORDER.into_iter().find(|rule| rule.matches(&lower))
}

/// Resolve `utterance` without the language backend
pub fn fallback(utterance: &str) -> Intent {
    match matching_rule(utterance) {
        Some(rule) => rule.build(utterance),
        None => Intent::none(CLARIFICATION_RESPONSE),
    }
}

fn email_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})").expect("valid email regex")
    })
}

fn subject_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_all(&[r"(?i)about\s+(.+)", r"(?i)subject\s+(.+)", r"(?i)regarding\s+(.+)"]))
}

fn body_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile_all(&[
            r"(?i)write\s+(.+)",
            r"(?i)say\s+(.+)",
            r"(?i)content\s+(.+)",
            r"(?i)body\s+(.+)",
            r"(?i)message\s+(.+)",
        ])
    })
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid extraction regex"))
        .collect()
}

fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// First email address in `text`
pub fn extract_email_address(text: &str) -> Option<String> {
    email_pattern().find(text).map(|m| m.as_str().to_string())
}

/// Text after `about`, `subject` or `regarding`
pub fn extract_subject(text: &str) -> Option<String> {
    first_capture(subject_patterns(), text)
}

/// Text after `write`, `say`, `content`, `body` or `message`
pub fn extract_body(text: &str) -> Option<String> {
    first_capture(body_patterns(), text)
}

/// Canonical app name from the alias table
pub fn extract_app_name(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    APP_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.iter().any(|alias| lower.contains(alias)))
        .map(|(app, _)| *app)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_rule() {
        let intent = fallback("take a screenshot");
        assert_eq!(intent.action, IntentAction::SystemCmd);
        assert_eq!(intent.param_str("command"), Some("screenshot"));
        assert_eq!(intent.response, "Taking a screenshot now.");
    }

    #[test]
    fn test_screenshot_precedes_open() {
        assert_eq!(
            matching_rule("open the screenshot folder"),
            Some(FallbackRule::Screenshot)
        );
    }

    #[test]
    fn test_email_extracts_address() {
        let intent = fallback("send an email to a@b.com");
        assert_eq!(intent.action, IntentAction::Email);
        assert_eq!(intent.param_str("operation"), Some("compose"));
        assert_eq!(intent.param_str("to"), Some("a@b.com"));
        assert_eq!(intent.param_str("subject"), Some(""));
        assert_eq!(intent.param_str("body"), Some(""));
        assert_eq!(intent.response, "I'll help you with the email to a@b.com.");
    }

    #[test]
    fn test_email_extracts_subject_and_body() {
        let intent = fallback("email bob@example.org about the launch");
        assert_eq!(intent.param_str("subject"), Some("the launch"));
        assert_eq!(intent.param_str("to"), Some("bob@example.org"));

        let intent = fallback("compose a note and say hello team");
        assert_eq!(intent.param_str("body"), Some("hello team"));
    }

    #[test]
    fn test_subject_pattern_order() {
        // "about" is tried before "subject"
        assert_eq!(
            extract_subject("subject is lunch, about noon").as_deref(),
            Some("noon")
        );
        assert_eq!(extract_subject("Regarding Budget").as_deref(), Some("Budget"));
        assert_eq!(extract_subject("no topic here"), None);
    }

    #[test]
    fn test_open_gmail_is_email() {
        // "gmail" contains "mail", so the email rule fires first
        assert_eq!(fallback("open gmail").action, IntentAction::Email);
        assert_eq!(fallback("open email").action, IntentAction::Email);
    }

    #[test]
    fn test_open_uses_alias_table() {
        let intent = fallback("open chrome");
        assert_eq!(intent.action, IntentAction::AppOpen);
        assert_eq!(intent.param_str("app"), Some("chrome"));
        assert_eq!(intent.response, "Opening chrome.");

        assert_eq!(fallback("launch the browser").param_str("app"), Some("chrome"));
        assert_eq!(fallback("start calc").param_str("app"), Some("calculator"));
        assert_eq!(fallback("open my spreadsheet").param_str("app"), Some("excel"));
    }

    #[test]
    fn test_open_unknown_defaults_to_notepad() {
        let intent = fallback("open something strange");
        assert_eq!(intent.param_str("app"), Some(DEFAULT_APP));
        assert_eq!(intent.response, "Opening application.");
    }

    #[test]
    fn test_time_rule() {
        let intent = fallback("what time is it");
        assert_eq!(intent.action, IntentAction::Time);
        assert!(intent.parameters.is_empty());
    }

    #[test]
    fn test_document_rule() {
        let intent = fallback("make a new file");
        assert_eq!(intent.action, IntentAction::Document);
        assert_eq!(intent.param_str("operation"), Some("create"));
    }

    #[test]
    fn test_no_match() {
        let intent = fallback("how are you");
        assert_eq!(intent.action, IntentAction::None);
        assert_eq!(intent.response, CLARIFICATION_RESPONSE);
        assert!(!intent.requires_confirmation);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(matching_rule("TAKE A PICTURE"), Some(FallbackRule::Screenshot));
        assert_eq!(matching_rule("Open Firefox"), Some(FallbackRule::AppOpen));
    }
}
