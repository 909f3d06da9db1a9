//! Shapes returned to the host shell

use crate::command::result::ActionResult;
use crate::core::types::Platform;
use crate::llm::parser::{IntentAction, Parameters};
use crate::pipeline::state::PipelineState;
use serde::Serialize;

/// Reply to `submit_utterance`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandRecord>,
}

/// What happened to one command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    /// The utterance as received
    pub command: String,
    pub intent: IntentAction,
    pub parameters: Parameters,
    pub execution_result: Option<ActionResult>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub awaiting_confirmation: bool,
    pub timestamp: String,
}

impl CommandRecord {
    pub fn new(command: &str, intent: IntentAction, parameters: Parameters) -> Self {
        Self {
            command: command.to_string(),
            intent,
            parameters,
            execution_result: None,
            awaiting_confirmation: false,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl HostResponse {
    /// A command that ran (or deliberately ran nothing)
    pub fn handled(message: impl Into<String>, record: CommandRecord) -> Self {
        let success = record
            .execution_result
            .as_ref()
            .map(|r| r.success)
            .unwrap_or(true);
        Self {
            success,
            message: message.into(),
            data: Some(record),
        }
    }

    /// Input accepted without running anything
    pub fn acknowledged(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn execution_result(&self) -> Option<&ActionResult> {
        self.data.as_ref()?.execution_result.as_ref()
    }
}

/// Reply to `status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantStatus {
    pub initialized: bool,
    pub listening: bool,
    pub state: PipelineState,
    pub platform: Platform,
    pub ai_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_handled_success_follows_execution() {
        let mut record = CommandRecord::new("open chrome", IntentAction::AppOpen, Parameters::new());
        assert!(HostResponse::handled("Opening chrome.", record.clone()).success);

        record.execution_result = Some(ActionResult::failure("boom", "Failed to open chrome"));
        assert!(!HostResponse::handled("Opening chrome.", record).success);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = CommandRecord::new("what time is it", IntentAction::Time, Parameters::new());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["intent"], json!("time"));
        assert!(value.get("executionResult").is_some());
        assert!(value.get("awaitingConfirmation").is_none());
    }
}
