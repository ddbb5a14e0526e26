//! Tool dispatch.
//!
//! The executor is the boundary between the agent loop and tool code:
//! whatever goes wrong in here comes back as a [`ToolResult`] the model can
//! read, never as an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{ReportedFailure, ToolRegistry};
use crate::types::{Message, ToolCall};

/// How a dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    UnknownTool,
    MalformedArguments,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub status: ToolStatus,
}

impl ToolResult {
    pub fn into_message(self) -> Message {
        Message::tool_result(self.tool_call_id, self.content)
    }
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        let result = |status: ToolStatus, content: String| ToolResult {
            tool_call_id: call.id.clone(),
            content,
            status,
        };

        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return result(
                ToolStatus::UnknownTool,
                format!(
                    "Error: unknown tool '{}'. Available tools: {}",
                    call.name,
                    self.registry.names().join(", ")
                ),
            );
        };

        let params = match decode_arguments(&call.arguments) {
            Ok(params) => params,
            Err(reason) => {
                warn!(tool = %call.name, %reason, "malformed tool arguments");
                return result(
                    ToolStatus::MalformedArguments,
                    format!(
                        "Error: malformed arguments for tool '{}': {}",
                        call.name, reason
                    ),
                );
            }
        };

        debug!(tool = %call.name, id = %call.id, "executing tool");
        match tool.execute(params).await {
            Ok(output) => result(ToolStatus::Success, output),
            Err(e) => {
                warn!(tool = %call.name, error = %format!("{:#}", e), "tool failed");
                let content = match e.downcast_ref::<ReportedFailure>() {
                    Some(reported) => reported.0.clone(),
                    None => format!("Error: tool '{}' failed: {:#}", call.name, e),
                };
                result(ToolStatus::Failed, content)
            }
        }
    }
}

/// Decode a JSON argument blob into an object. Blank input means no arguments.
pub fn decode_arguments(raw: &str) -> Result<serde_json::Value, String> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    if !value.is_object() {
        return Err(format!("expected a JSON object, got: {}", raw.trim()));
    }
    Ok(value)
}
