//! Tool System module.
//!
//! This module defines the `Tool` trait and the `ToolRegistry` that holds
//! every tool the model may call.
//!
//! - **Tool trait**: every tool provides its name, description, JSON Schema
//!   for parameters, and an execute method. Because the advertised schema
//!   comes from the implementation itself, the two cannot drift apart.
//! - **ToolRegistry**: built once at startup, validated, then shared
//!   read-only. Dispatch goes through [`executor::ToolExecutor`].

pub mod analysis;
pub mod executor;
pub mod lookup;
pub mod visualization;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::context::AgentContext;
use crate::types::ToolDefinition;

/// Trait that all tools must implement.
///
/// Tools receive decoded JSON arguments and return a string result that
/// is sent back to the model.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g. "lookup_sales_data").
    fn name(&self) -> &str;

    /// The model reads this to decide when to use the tool.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    async fn execute(&self, params: serde_json::Value) -> Result<String>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("tool '{0}' is registered more than once")]
    DuplicateName(String),
    #[error("tool '{name}' has an invalid parameters schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

/// Name-indexed, immutable set of tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Build a registry, rejecting empty or duplicate names and schemas
    /// whose `required` list names parameters that are not declared.
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Result<Self, RegistryError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (position, tool) in tools.iter().enumerate() {
            let name = tool.name();
            if name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            validate_schema(name, &tool.parameters_schema())?;
            if index.insert(name.to_string(), position).is_some() {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }
        }
        Ok(Self { tools, index })
    }

    /// All tool definitions in registration order (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&i| self.tools[i].as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

fn validate_schema(name: &str, schema: &serde_json::Value) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidSchema {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if schema.get("type").and_then(|t| t.as_str()) != Some("object") {
        return Err(invalid("top-level type must be \"object\""));
    }
    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .ok_or_else(|| invalid("missing \"properties\" object"))?;

    if let Some(required) = schema.get("required") {
        let required = required
            .as_array()
            .ok_or_else(|| invalid("\"required\" must be an array"))?;
        for entry in required {
            let key = entry
                .as_str()
                .ok_or_else(|| invalid("\"required\" entries must be strings"))?;
            if !properties.contains_key(key) {
                return Err(invalid(&format!(
                    "required parameter '{}' is not declared",
                    key
                )));
            }
        }
    }
    Ok(())
}

/// A failure whose text the tool has already worded for the model.
///
/// The executor forwards the message verbatim (still marked as failed)
/// instead of wrapping it in its generic "tool failed" envelope.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ReportedFailure(pub String);

/// Read a required string parameter.
pub(crate) fn required_str<'a>(params: &'a serde_json::Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing required parameter: {}", key))
}

/// Create the registry with the three sales-data tools.
pub fn create_default_registry(ctx: Arc<AgentContext>) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::new(vec![
        Box::new(lookup::LookupSalesDataTool::new(ctx.clone())),
        Box::new(analysis::AnalyzeSalesDataTool::new(ctx.clone())),
        Box::new(visualization::GenerateVisualizationTool::new(ctx)),
    ])
}
