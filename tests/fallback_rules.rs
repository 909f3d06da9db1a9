//! Keyword fallback table

mod common;

use common::DownBackend;
use proptest::prelude::*;
use std::time::Duration;
use voxdesk::command::{IntentResolver, SessionContext};
use voxdesk::core::types::SessionId;
use voxdesk::llm::fallback::{fallback, matching_rule, CLARIFICATION_RESPONSE};
use voxdesk::llm::{FallbackRule, IntentAction};

fn all_keywords() -> Vec<(FallbackRule, &'static str)> {
    FallbackRule::ORDER
        .iter()
        .flat_map(|rule| rule.keywords().iter().map(move |k| (*rule, *k)))
        .collect()
}

/// Rule a lone keyword should select: the earliest rule it triggers
fn expected_rule(keyword: &str) -> FallbackRule {
    FallbackRule::ORDER
        .into_iter()
        .find(|rule| rule.matches(keyword))
        .unwrap()
}

proptest! {
    #[test]
    fn keyword_with_neutral_filler_selects_rule(
        index in 0usize..24,
        prefix in "[0-9 ]{0,12}",
        suffix in "[0-9 ]{0,12}",
        shout in any::<bool>(),
    ) {
        let keywords = all_keywords();
        let (_, keyword) = keywords[index % keywords.len()];
        let keyword = if shout { keyword.to_uppercase() } else { keyword.to_string() };
        let utterance = format!("{}{}{}", prefix, keyword, suffix);

        let expected = expected_rule(&keyword.to_lowercase());
        prop_assert_eq!(matching_rule(&utterance), Some(expected));
        prop_assert_eq!(fallback(&utterance).action, expected.action());
    }

    #[test]
    fn fallback_always_answers(utterance in any::<String>()) {
        let intent = fallback(&utterance);
        prop_assert!(!intent.response.is_empty());
        if intent.action == IntentAction::None {
            prop_assert_eq!(intent.response, CLARIFICATION_RESPONSE);
        }
    }
}

#[test]
fn test_screenshot_beats_open() {
    let intent = fallback("open the app and take a screenshot");
    assert_eq!(intent.action, IntentAction::SystemCmd);
    assert_eq!(intent.param_str("command"), Some("screenshot"));
}

#[test]
fn test_open_gmail_is_email_compose() {
    let intent = fallback("open gmail");
    assert_eq!(intent.action, IntentAction::Email);
    assert_eq!(intent.param_str("operation"), Some("compose"));
}

#[test]
fn test_app_aliases() {
    let browser = fallback("launch the browser");
    assert_eq!(browser.action, IntentAction::AppOpen);
    assert_eq!(browser.param_str("app"), Some("chrome"));
    assert_eq!(browser.response, "Opening chrome.");

    let spreadsheet = fallback("start a spreadsheet");
    assert_eq!(spreadsheet.param_str("app"), Some("excel"));

    let unknown = fallback("open the pod bay doors");
    assert_eq!(unknown.param_str("app"), Some("notepad"));
    assert_eq!(unknown.response, "Opening application.");
}

#[test]
fn test_email_field_extraction() {
    let intent = fallback("send an email to a@b.com about lunch plans");
    assert_eq!(intent.param_str("to"), Some("a@b.com"));
    assert_eq!(intent.param_str("subject"), Some("lunch plans"));
    assert_eq!(intent.param_str("body"), Some(""));
    assert_eq!(
        intent.response,
        "I'll help you with the email to a@b.com about lunch plans."
    );
}

#[test]
fn test_time_and_document_rules() {
    assert_eq!(fallback("what hour is it").action, IntentAction::Time);
    let doc = fallback("make a new file");
    assert_eq!(doc.action, IntentAction::Document);
    assert_eq!(doc.param_str("operation"), Some("create"));
}

#[test]
fn test_no_match_asks_to_rephrase() {
    let intent = fallback("how are you");
    assert_eq!(intent.action, IntentAction::None);
    assert_eq!(intent.response, CLARIFICATION_RESPONSE);
}

#[tokio::test]
async fn test_degraded_mode_matches_fallback_for_every_keyword() {
    let backend = DownBackend::new();
    let resolver = IntentResolver::new(backend, Duration::from_secs(1), 10);
    let session = SessionContext::new(SessionId::new(), 10);

    for (_, keyword) in all_keywords() {
        let utterance = format!("please {} now", keyword);
        let resolved = resolver.resolve(&utterance, &session).await;
        assert_eq!(resolved.intent, fallback(&utterance), "{}", utterance);
    }
}
