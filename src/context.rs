//! Shared runtime context.
//!
//! One `AgentContext` is built at startup and handed by `Arc` to the agent
//! loop and to every tool, so nothing reaches for a global client.

use std::sync::Arc;

use anyhow::Result;

use crate::config::AppConfig;
use crate::llm::LlmProvider;
use crate::types::{ChatRequest, ChatResponse, Message, ResponseFormat};

pub struct AgentContext {
    pub llm: Arc<dyn LlmProvider>,
    pub config: AppConfig,
}

impl AgentContext {
    pub fn new(llm: Arc<dyn LlmProvider>, config: AppConfig) -> Self {
        Self { llm, config }
    }

    /// Single-turn completion without tools, used by tools that need the
    /// model for SQL, analysis or chart generation.
    pub async fn complete(&self, prompt: String) -> Result<ChatResponse> {
        self.complete_with_format(prompt, None).await
    }

    pub async fn complete_with_format(
        &self,
        prompt: String,
        response_format: Option<ResponseFormat>,
    ) -> Result<ChatResponse> {
        let request = ChatRequest {
            model: self.config.llm.model.clone(),
            messages: vec![Message::user(prompt)],
            tools: vec![],
            max_tokens: self.config.llm.max_tokens,
            response_format,
        };
        self.llm.chat_completion(&request).await
    }
}
