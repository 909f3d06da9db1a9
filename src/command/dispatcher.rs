//! Action dispatch - routes a resolved intent to its handler
//!
//! Every handler catches its own failures; `execute` always returns an
//! [`ActionResult`] and never an error.

use crate::command::documents::DocumentHandler;
use crate::command::email::EmailHandler;
use crate::command::result::ActionResult;
use crate::command::session::SessionContext;
use crate::command::text_param;
use crate::core::config::{AssistantConfig, WebmailProvider};
use crate::llm::parser::{IntentAction, Parameters};
use crate::platform::PlatformExecutor;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

/// Routes actions to the platform executor or built-in logic
pub struct ActionDispatcher {
    executor: Arc<dyn PlatformExecutor>,
    provider: WebmailProvider,
    documents_dir: PathBuf,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn PlatformExecutor>, config: &AssistantConfig) -> Self {
        Self {
            executor,
            provider: config.email.provider,
            documents_dir: config.paths.documents_dir.clone(),
        }
    }

    pub fn executor(&self) -> &Arc<dyn PlatformExecutor> {
        &self.executor
    }

    /// Execute one action within `session`
    pub async fn execute(
        &self,
        session: &mut SessionContext,
        action: IntentAction,
        params: &Parameters,
    ) -> ActionResult {
        tracing::info!("Executing action: {} {:?}", action, params);

        let result = match action {
            IntentAction::AppOpen => self.open_app(params).await,
            IntentAction::SystemCmd => self.system_command(params).await,
            IntentAction::Time => current_time(),
            IntentAction::Email => {
                EmailHandler::new(self.executor.as_ref(), self.provider)
                    .handle(&mut session.email, params)
                    .await
            }
            IntentAction::Calendar => ActionResult::ok_with(
                "Calendar functionality will be implemented with Microsoft Graph API",
                Value::Object(params.clone()),
            ),
            IntentAction::Document => {
                DocumentHandler::new(self.executor.as_ref(), &self.documents_dir)
                    .handle(params)
                    .await
            }
            IntentAction::Browser => ActionResult::ok_with(
                "Browser functionality will be implemented with Puppeteer",
                Value::Object(params.clone()),
            ),
            IntentAction::None => unknown_action(action.as_str()),
        };

        if !result.success {
            tracing::warn!(
                "Action {} failed: {}",
                action,
                result.error.as_deref().unwrap_or(&result.message)
            );
        }
        result
    }

    /// Execute an action given by its wire name, e.g. from a host request
    pub async fn execute_named(
        &self,
        session: &mut SessionContext,
        name: &str,
        params: &Parameters,
    ) -> ActionResult {
        match IntentAction::from_wire(name) {
            Some(action) => self.execute(session, action, params).await,
            None => unknown_action(name),
        }
    }

    async fn open_app(&self, params: &Parameters) -> ActionResult {
        let Some(app) = text_param(params, "app") else {
            return ActionResult::failure(
                "No app specified",
                "Please specify which application to open",
            );
        };
        match self.executor.open_app(&app).await {
            Ok(()) => ActionResult::ok_with(format!("Opened {}", app), json!({ "app": app })),
            Err(e) => ActionResult::failure(e.to_string(), format!("Failed to open {}", app))
                .with_data(json!({ "app": app })),
        }
    }

    async fn system_command(&self, params: &Parameters) -> ActionResult {
        let command = text_param(params, "command").unwrap_or_default();
        match command.to_lowercase().as_str() {
            "screenshot" => match self.executor.take_screenshot().await {
                Ok(path) => {
                    let path = path.display().to_string();
                    ActionResult::ok_with(
                        format!("Screenshot saved to {}", path),
                        json!({ "path": path }),
                    )
                }
                Err(e) => ActionResult::failure(e.to_string(), "Failed to take a screenshot"),
            },
            "type" => {
                let Some(text) = text_param(params, "text") else {
                    return ActionResult::failure("No text specified", "What should I type?");
                };
                match self.executor.send_keys(&text).await {
                    Ok(()) => {
                        ActionResult::ok_with(format!("Typed: {}", text), json!({ "text": text }))
                    }
                    Err(e) => ActionResult::failure(e.to_string(), "Failed to type text"),
                }
            }
            "click" => {
                let (Some(x), Some(y)) = (int_param(params, "x"), int_param(params, "y")) else {
                    return ActionResult::failure(
                        "Click needs x and y coordinates",
                        "Where should I click?",
                    );
                };
                match self.executor.click_at(x, y).await {
                    Ok(()) => ActionResult::ok_with(
                        format!("Clicked at position ({}, {})", x, y),
                        json!({ "x": x, "y": y }),
                    ),
                    Err(e) => ActionResult::failure(e.to_string(), "Failed to click"),
                }
            }
            "active_window" | "window" => match self.executor.active_window().await {
                Ok(title) => ActionResult::ok_with(
                    format!("The active window is {}", title),
                    json!({ "window": title }),
                ),
                Err(e) => ActionResult::failure(e.to_string(), "Failed to read the active window"),
            },
            _ => ActionResult::failure(
                format!("Unknown system command: {}", command),
                format!("I don't know how to execute {}", command),
            ),
        }
    }
}

fn unknown_action(name: &str) -> ActionResult {
    ActionResult::failure("Unknown action", format!("I don't know how to handle {}", name))
}

/// Integer parameter given either as a JSON number or a numeric string
fn int_param(params: &Parameters, key: &str) -> Option<i32> {
    match params.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .and_then(|v| i32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Wall-clock read; never fails
pub fn current_time() -> ActionResult {
    let now = chrono::Local::now();
    let time = now.format("%-I:%M:%S %p").to_string();
    let date = now.format("%-m/%-d/%Y").to_string();
    ActionResult::ok_with(
        format!("Current time: {}, Date: {}", time, date),
        json!({
            "time": time,
            "date": date,
            "timestamp": now.with_timezone(&chrono::Utc).to_rfc3339(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_fields() {
        let result = current_time();
        assert!(result.success);
        assert!(result.data_str("time").is_some());
        assert!(result.data_str("date").is_some());
        let stamp = result.data_str("timestamp").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_int_param_accepts_numbers_and_strings() {
        let mut params = Parameters::new();
        params.insert("x".into(), json!(120));
        params.insert("y".into(), json!("45"));
        params.insert("z".into(), json!(true));
        assert_eq!(int_param(&params, "x"), Some(120));
        assert_eq!(int_param(&params, "y"), Some(45));
        assert_eq!(int_param(&params, "z"), None);
        assert_eq!(int_param(&params, "w"), None);
    }

    #[test]
    fn test_unknown_action_shape() {
        let result = unknown_action("teleport");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown action"));
    }
}
