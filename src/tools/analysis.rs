//! Analyze Sales Data tool: one model call over looked-up data.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use super::{required_str, Tool};
use crate::context::AgentContext;

pub const NO_ANALYSIS: &str = "No analysis could be generated";

pub struct AnalyzeSalesDataTool {
    ctx: Arc<AgentContext>,
}

impl AnalyzeSalesDataTool {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }
}

fn analysis_prompt(prompt: &str, data: &str) -> String {
    format!(
        "Analyze the following data: {}\nYour job is to answer the following question: {}",
        data, prompt
    )
}

#[async_trait]
impl Tool for AnalyzeSalesDataTool {
    fn name(&self) -> &str {
        "analyze_sales_data"
    }

    fn description(&self) -> &str {
        "Analyze sales data to extract insights"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "string",
                    "description": "The lookup_sales_data tool's output."
                },
                "prompt": {
                    "type": "string",
                    "description": "The unchanged prompt that the user provided."
                }
            },
            "required": ["data", "prompt"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let prompt = required_str(&params, "prompt")?;
        let data = required_str(&params, "data")?;

        let response = self.ctx.complete(analysis_prompt(prompt, data)).await?;
        if response.content.trim().is_empty() {
            Ok(NO_ANALYSIS.to_string())
        } else {
            Ok(response.content)
        }
    }
}
