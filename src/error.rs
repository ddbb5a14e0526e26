/// Fatal outcomes of an agent run. Tool failures never show up here; they
/// are fed back to the model as tool results instead.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model service call failed: {0:#}")]
    Model(#[source] anyhow::Error),

    #[error("Agent stopped: reached maximum of {0} iterations")]
    MaxIterations(u32),

    #[error("Agent run cancelled")]
    Cancelled,
}
