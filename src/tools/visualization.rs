//! Generate Visualization tool.
//!
//! Two model calls: the first derives a [`ChartConfig`] from the data and
//! the goal using structured output, the second writes Python plotting code
//! for that config. The code is returned as text and never run here.
//!
//! If the first call yields nothing usable the tool continues with
//! [`ChartConfig::fallback`] instead of failing.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::{required_str, Tool};
use crate::context::AgentContext;
use crate::types::ResponseFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub chart_type: String,
    pub x_axis: String,
    pub y_axis: String,
    pub title: String,
}

impl ChartConfig {
    pub fn fallback(visualization_goal: &str) -> Self {
        Self {
            chart_type: "line".to_string(),
            x_axis: "date".to_string(),
            y_axis: "value".to_string(),
            title: visualization_goal.to_string(),
        }
    }

    fn response_format() -> ResponseFormat {
        ResponseFormat {
            name: "visualization_config".to_string(),
            schema: json!({
                "type": "object",
                "properties": {
                    "chart_type": {"type": "string", "description": "Type of chart to generate"},
                    "x_axis": {"type": "string", "description": "Name of the x-axis column"},
                    "y_axis": {"type": "string", "description": "Name of the y-axis column"},
                    "title": {"type": "string", "description": "Title of the chart"}
                },
                "required": ["chart_type", "x_axis", "y_axis", "title"],
                "additionalProperties": false
            }),
        }
    }
}

pub struct GenerateVisualizationTool {
    ctx: Arc<AgentContext>,
}

impl GenerateVisualizationTool {
    pub fn new(ctx: Arc<AgentContext>) -> Self {
        Self { ctx }
    }

    /// Stage one. Never fails: degraded paths log and return the fallback.
    pub async fn extract_chart_config(&self, data: &str, visualization_goal: &str) -> ChartConfig {
        let prompt = format!(
            "Generate a chart configuration based on this data: {}\nThe goal is to show: {}",
            data, visualization_goal
        );

        let response = match self
            .ctx
            .complete_with_format(prompt, Some(ChartConfig::response_format()))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "chart config request failed, using default config");
                return ChartConfig::fallback(visualization_goal);
            }
        };

        match serde_json::from_str::<ChartConfig>(response.content.trim()) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "chart config response was not usable, using default config");
                ChartConfig::fallback(visualization_goal)
            }
        }
    }

    /// Stage two: ask for plotting code and strip any markdown fence.
    pub async fn create_chart(&self, config: &ChartConfig, data: &str) -> Result<String> {
        let config = json!({
            "chart_type": config.chart_type,
            "x_axis": config.x_axis,
            "y_axis": config.y_axis,
            "title": config.title,
            "data": data,
        });
        let prompt = format!(
            "Write python code to create a chart based on the following configuration.\n\
             Only return the code, no other text.\nconfig: {}",
            config
        );

        let response = self.ctx.complete(prompt).await?;
        Ok(strip_code_fence(&response.content))
    }
}

fn strip_code_fence(code: &str) -> String {
    code.replace("```python", "")
        .replace("```", "")
        .trim()
        .to_string()
}

#[async_trait]
impl Tool for GenerateVisualizationTool {
    fn name(&self) -> &str {
        "generate_visualization"
    }

    fn description(&self) -> &str {
        "Generate Python code to create data visualizations"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "string",
                    "description": "The lookup_sales_data tool's output."
                },
                "visualization_goal": {
                    "type": "string",
                    "description": "The goal of the visualization."
                }
            },
            "required": ["data", "visualization_goal"]
        })
    }

    async fn execute(&self, params: serde_json::Value) -> Result<String> {
        let data = required_str(&params, "data")?;
        let goal = required_str(&params, "visualization_goal")?;

        let config = self.extract_chart_config(data, goal).await;
        self.create_chart(&config, data).await
    }
}
