//! A provider double for tests: replays canned responses in order and
//! records every request it receives.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::LlmProvider;
use crate::types::{ChatRequest, ChatResponse, ToolCall};

pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ChatResponse>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<Result<ChatResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("scripted provider ran out of responses")))
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

pub fn text(content: &str) -> Result<ChatResponse> {
    Ok(ChatResponse {
        content: content.to_string(),
        tool_calls: vec![],
        usage: None,
    })
}

pub fn calls(calls: &[(&str, &str, &str)]) -> Result<ChatResponse> {
    Ok(ChatResponse {
        content: String::new(),
        tool_calls: calls
            .iter()
            .map(|(id, name, arguments)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
            })
            .collect(),
        usage: None,
    })
}
