//! LLM Client module.
//!
//! This module defines the `LlmProvider` trait that abstracts over the
//! model service, and provides the OpenAI-compatible implementation used
//! by the agent loop and by tools that make nested model calls.

pub mod openai_compatible;
#[cfg(test)]
pub mod scripted;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::types::{ChatRequest, ChatResponse};

/// Trait that all model providers must implement.
///
/// The agent loop and the tools only ever see this trait, so tests can
/// substitute a scripted provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Return the provider's display name (for logging).
    fn name(&self) -> &str;
}

/// Create the provider named in the config.
pub fn create_provider(
    provider: &str,
    api_key: String,
    api_base: Option<String>,
) -> Result<Box<dyn LlmProvider>> {
    match provider {
        "openai" | "openai_compatible" => Ok(Box::new(
            openai_compatible::OpenAiCompatibleProvider::new(api_key, api_base),
        )),
        other => bail!(
            "Unknown provider: '{}'. Supported: 'openai', 'openai_compatible'",
            other
        ),
    }
}
