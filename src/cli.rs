use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::config::AppConfig;
use crate::types::AgentInput;

/// Ask questions about the store sales dataset.
#[derive(Debug, Parser)]
#[command(name = "sales-agent", version, about)]
pub struct Cli {
    /// The request, e.g. "Show me all the sales for store 1320 on November 1st, 2021"
    pub prompt: Option<String>,

    /// Read a JSON message history (or a JSON string) instead of PROMPT
    #[arg(long, value_name = "FILE", conflicts_with = "prompt")]
    pub messages: Option<PathBuf>,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// Override the maximum number of model round-trips
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_iterations: Option<u32>,

    /// Override the parquet dataset path
    #[arg(long, value_name = "PATH")]
    pub dataset: Option<PathBuf>,

    /// Print the full conversation as JSON after the answer
    #[arg(long)]
    pub transcript: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(max) = self.max_iterations {
            config.agent.max_iterations = max;
        }
        if let Some(dataset) = &self.dataset {
            config.data.dataset_path = dataset.clone();
        }
    }

    pub fn input(&self) -> Result<AgentInput> {
        match (&self.prompt, &self.messages) {
            (Some(prompt), None) => Ok(AgentInput::Text(prompt.clone())),
            (None, Some(path)) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read messages file: {}", path.display()))?;
                AgentInput::from_json(&raw).with_context(|| {
                    format!(
                        "{} must hold a JSON string or an array of messages",
                        path.display()
                    )
                })
            }
            (None, None) => bail!("Provide a PROMPT or --messages FILE"),
            (Some(_), Some(_)) => bail!("PROMPT and --messages cannot be combined"),
        }
    }
}
