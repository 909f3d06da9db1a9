//! Email handling: the multi-turn compose flow plus stateless mailbox stubs
//!
//! Compose is a small state machine over [`EmailComposeContext`]. The first
//! compose turn opens a webmail compose window with whatever is known and asks
//! for the missing recipient/subject. Later turns only fill slots, until both
//! recipient and subject are present, at which point the compose window is
//! opened again with the completed fields.

use crate::command::result::ActionResult;
use crate::command::text_param;
use crate::core::config::WebmailProvider;
use crate::core::error::{Result, VoxError};
use crate::llm::parser::Parameters;
use crate::platform::PlatformExecutor;
use reqwest::Url;
use serde_json::json;

const GMAIL_COMPOSE: &str = "https://mail.google.com/mail/";
const OUTLOOK_COMPOSE: &str = "https://outlook.live.com/mail/0/deeplink/compose";

/// Slots of the email being composed in one session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailComposeContext {
    /// True from the first compose turn until an explicit reset
    pub is_composing: bool,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub last_compose_url: Option<String>,
}

/// Email fields supplied by one intent; empty strings count as absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailFields {
    pub to: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
}

impl EmailFields {
    pub fn from_params(params: &Parameters) -> Self {
        Self {
            to: text_param(params, "to"),
            subject: text_param(params, "subject"),
            body: text_param(params, "body"),
        }
    }
}

impl EmailComposeContext {
    /// Merge supplied fields; fields not supplied keep their value
    pub fn apply(&mut self, fields: &EmailFields) {
        if let Some(to) = &fields.to {
            self.to = Some(to.clone());
        }
        if let Some(subject) = &fields.subject {
            self.subject = Some(subject.clone());
        }
        if let Some(body) = &fields.body {
            self.body = Some(body.clone());
        }
    }

    pub fn has_recipient(&self) -> bool {
        self.to.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn has_subject(&self) -> bool {
        self.subject.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    /// Prompt for whatever is still missing
    pub fn missing_prompt(&self) -> String {
        match (self.has_recipient(), self.has_subject()) {
            (true, true) => "Email details complete!".to_string(),
            (false, false) => {
                "Now, who should I send this email to, and what's the subject?".to_string()
            }
            (false, true) => format!(
                "Great! The subject is \"{}\". Who should I send this email to?",
                self.subject.as_deref().unwrap_or_default()
            ),
            (true, false) => format!(
                "Perfect! I'll send it to {}. What should the subject be?",
                self.to.as_deref().unwrap_or_default()
            ),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
        tracing::debug!("Email context reset");
    }

    fn snapshot(&self) -> serde_json::Value {
        json!({
            "to": self.to,
            "subject": self.subject,
            "body": self.body,
        })
    }
}

/// Email operations accepted in `parameters.operation`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOperation {
    Compose,
    Send,
    Read,
    Search,
    Reply,
    Draft,
    Cancel,
    Unknown(String),
}

impl EmailOperation {
    /// A missing operation means compose; `open` is an alias for compose
    pub fn from_params(params: &Parameters) -> Self {
        match text_param(params, "operation")
            .map(|op| op.to_lowercase())
            .as_deref()
        {
            None | Some("compose") | Some("open") => EmailOperation::Compose,
            Some("send") => EmailOperation::Send,
            Some("read") => EmailOperation::Read,
            Some("search") => EmailOperation::Search,
            Some("reply") => EmailOperation::Reply,
            Some("draft") => EmailOperation::Draft,
            Some("cancel") => EmailOperation::Cancel,
            Some(other) => EmailOperation::Unknown(other.to_string()),
        }
    }
}

/// Webmail compose link carrying the non-empty fields as query parameters
pub fn compose_url(
    provider: WebmailProvider,
    to: Option<&str>,
    subject: Option<&str>,
    body: Option<&str>,
) -> Result<String> {
    let base = match provider {
        WebmailProvider::Gmail => GMAIL_COMPOSE,
        WebmailProvider::Outlook => OUTLOOK_COMPOSE,
    };
    let mut url = Url::parse(base).map_err(|e| VoxError::Executor(format!("Bad compose URL: {}", e)))?;

    let mut pairs: Vec<(&str, &str)> = Vec::new();
    if provider == WebmailProvider::Gmail {
        pairs.push(("view", "cm"));
        pairs.push(("fs", "1"));
    }
    for (key, value) in [("to", to), ("subject", subject), ("body", body)] {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            pairs.push((key, value));
        }
    }
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url.to_string())
}

fn provider_name(provider: WebmailProvider) -> &'static str {
    match provider {
        WebmailProvider::Gmail => "Gmail",
        WebmailProvider::Outlook => "Outlook",
    }
}

/// Runs email operations against one session's compose context
pub struct EmailHandler<'a> {
    executor: &'a dyn PlatformExecutor,
    provider: WebmailProvider,
}

impl<'a> EmailHandler<'a> {
    pub fn new(executor: &'a dyn PlatformExecutor, provider: WebmailProvider) -> Self {
        Self { executor, provider }
    }

    pub async fn handle(&self, ctx: &mut EmailComposeContext, params: &Parameters) -> ActionResult {
        let fields = EmailFields::from_params(params);
        match EmailOperation::from_params(params) {
            EmailOperation::Compose => self.compose(ctx, &fields).await,
            EmailOperation::Send => self.send(&fields).await,
            EmailOperation::Read => read_emails(text_param(params, "searchQuery")),
            EmailOperation::Search => search_emails(text_param(params, "searchQuery")),
            EmailOperation::Reply => reply_to_email(text_param(params, "messageId"), fields.body),
            EmailOperation::Draft => create_draft(&fields),
            EmailOperation::Cancel => {
                ctx.reset();
                ActionResult::ok("Email cancelled.")
            }
            EmailOperation::Unknown(op) => ActionResult::failure(
                format!("Unknown email operation: {}", op),
                format!("I don't know how to {} email", op),
            )
            .with_data(serde_json::Value::Object(params.clone())),
        }
    }

    /// One turn of the compose state machine
    pub async fn compose(&self, ctx: &mut EmailComposeContext, fields: &EmailFields) -> ActionResult {
        ctx.apply(fields);

        if !ctx.is_composing {
            ctx.is_composing = true;
            tracing::info!("Starting email composition");
            let opened = self.open_compose(ctx).await;
            if !opened.success {
                return opened;
            }
            let mut data = ctx.snapshot();
            data["status"] = json!("compose_opened");
            data["url"] = json!(ctx.last_compose_url);
            return ActionResult::ok_with(format!("{} {}", opened.message, ctx.missing_prompt()), data);
        }

        if ctx.has_recipient() && ctx.has_subject() {
            tracing::info!("Email details complete, reopening compose window");
            return self.open_compose(ctx).await;
        }

        let mut data = ctx.snapshot();
        data["status"] = json!("waiting_for_details");
        ActionResult::ok_with(ctx.missing_prompt(), data)
    }

    /// Open a compose window for the given fields without touching any context
    pub async fn send(&self, fields: &EmailFields) -> ActionResult {
        let mut scratch = EmailComposeContext::default();
        scratch.apply(fields);
        self.open_compose(&mut scratch).await
    }

    async fn open_compose(&self, ctx: &mut EmailComposeContext) -> ActionResult {
        let service = provider_name(self.provider);
        let url = match compose_url(
            self.provider,
            ctx.to.as_deref(),
            ctx.subject.as_deref(),
            ctx.body.as_deref(),
        ) {
            Ok(url) => url,
            Err(e) => return ActionResult::failure(e.to_string(), format!("Failed to open {}", service)),
        };
        tracing::debug!("Compose URL: {}", url);

        if let Err(e) = self.executor.open_url(&url).await {
            tracing::warn!("Failed to open {} compose: {}", service, e);
            return ActionResult::failure(e.to_string(), format!("Failed to open {}: {}", service, e))
                .with_data(ctx.snapshot());
        }
        ctx.last_compose_url = Some(url.clone());

        let mut message = format!("Opening {} compose", service);
        if let Some(to) = ctx.to.as_deref().filter(|s| !s.is_empty()) {
            message.push_str(&format!(" to {}", to));
        }
        if let Some(subject) = ctx.subject.as_deref().filter(|s| !s.is_empty()) {
            message.push_str(&format!(" about \"{}\"", subject));
        }
        message.push('.');

        let mut data = ctx.snapshot();
        data["service"] = json!(service.to_lowercase());
        data["url"] = json!(url);
        data["status"] = json!("opening_browser");
        ActionResult::ok_with(message, data)
    }
}

// Mailbox operations below are canned until a mailbox API is wired in.

fn read_emails(query: Option<String>) -> ActionResult {
    let message = match &query {
        Some(q) => format!("Read emails matching: {}", q),
        None => "Read emails".to_string(),
    };
    ActionResult::ok_with(
        message,
        json!({
            "searchQuery": query,
            "emails": [{
                "from": "example@email.com",
                "subject": "Sample Email",
                "date": chrono::Utc::now().to_rfc3339(),
            }],
            "totalCount": 1,
        }),
    )
}

fn search_emails(query: Option<String>) -> ActionResult {
    let query = query.unwrap_or_default();
    ActionResult::ok_with(
        format!("Found emails matching: {}", query),
        json!({
            "searchQuery": query,
            "results": [{
                "from": "example@email.com",
                "subject": "Matching Email",
                "date": chrono::Utc::now().to_rfc3339(),
            }],
            "totalFound": 1,
        }),
    )
}

fn reply_to_email(message_id: Option<String>, body: Option<String>) -> ActionResult {
    let Some(message_id) = message_id else {
        return ActionResult::failure("No message specified", "Which email should I reply to?");
    };
    ActionResult::ok_with(
        format!("Reply sent to email: {}", message_id),
        json!({ "messageId": message_id, "body": body, "status": "replied" }),
    )
}

fn create_draft(fields: &EmailFields) -> ActionResult {
    ActionResult::ok_with(
        format!(
            "Email draft created for: {}",
            fields.to.as_deref().unwrap_or("no recipient")
        ),
        json!({
            "to": fields.to,
            "subject": fields.subject,
            "body": fields.body,
            "status": "draft",
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_gmail_url_only_includes_present_fields() {
        let url = compose_url(WebmailProvider::Gmail, Some("a@b.com"), None, Some("")).unwrap();
        assert!(url.starts_with("https://mail.google.com/mail/?view=cm&fs=1"));
        let pairs = query(&url);
        assert!(pairs.contains(&("to".into(), "a@b.com".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "subject" || k == "body"));
    }

    #[test]
    fn test_outlook_url_encodes_subject() {
        let url = compose_url(WebmailProvider::Outlook, None, Some("lunch & coffee"), None).unwrap();
        assert!(url.starts_with(OUTLOOK_COMPOSE));
        assert_eq!(query(&url), vec![("subject".into(), "lunch & coffee".into())]);
    }

    #[test]
    fn test_outlook_url_without_fields_has_no_query() {
        let url = compose_url(WebmailProvider::Outlook, None, None, None).unwrap();
        assert_eq!(url, OUTLOOK_COMPOSE);
    }

    #[test]
    fn test_apply_keeps_unsupplied_fields() {
        let mut ctx = EmailComposeContext::default();
        ctx.apply(&EmailFields {
            to: Some("a@b.com".into()),
            ..Default::default()
        });
        ctx.apply(&EmailFields {
            subject: Some("hello".into()),
            ..Default::default()
        });
        assert_eq!(ctx.to.as_deref(), Some("a@b.com"));
        assert_eq!(ctx.subject.as_deref(), Some("hello"));
    }

    #[test]
    fn test_empty_params_are_absent() {
        let mut params = Parameters::new();
        params.insert("to".into(), json!(""));
        params.insert("subject".into(), json!("  "));
        params.insert("body".into(), json!(null));
        assert_eq!(EmailFields::from_params(&params), EmailFields::default());
    }

    #[test]
    fn test_missing_prompt_phrasings() {
        let mut ctx = EmailComposeContext::default();
        assert_eq!(
            ctx.missing_prompt(),
            "Now, who should I send this email to, and what's the subject?"
        );
        ctx.subject = Some("hello".into());
        assert_eq!(
            ctx.missing_prompt(),
            "Great! The subject is \"hello\". Who should I send this email to?"
        );
        ctx.subject = None;
        ctx.to = Some("a@b.com".into());
        assert_eq!(
            ctx.missing_prompt(),
            "Perfect! I'll send it to a@b.com. What should the subject be?"
        );
        ctx.subject = Some("hello".into());
        assert_eq!(ctx.missing_prompt(), "Email details complete!");
    }

    #[test]
    fn test_operation_parsing() {
        let mut params = Parameters::new();
        assert_eq!(EmailOperation::from_params(&params), EmailOperation::Compose);
        params.insert("operation".into(), json!("Open"));
        assert_eq!(EmailOperation::from_params(&params), EmailOperation::Compose);
        params.insert("operation".into(), json!("archive"));
        assert_eq!(
            EmailOperation::from_params(&params),
            EmailOperation::Unknown("archive".into())
        );
    }

    #[test]
    fn test_reply_requires_message_id() {
        assert!(!reply_to_email(None, None).success);
        assert!(reply_to_email(Some("42".into()), None).success);
    }
}
