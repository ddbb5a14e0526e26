//! Agent Loop - the core of the sales assistant.
//!
//! The Agent orchestrates the conversation between the user, the model,
//! and the tools:
//!
//! ```text
//! User Input
//!     |
//!     v
//! +--------+     +-----+     +----------+
//! | Model  |<--->|Agent|<--->| Executor |
//! +--------+     +-----+     +----------+
//!     |              |
//!     v              v
//! Text Reply    Tool Results
//! ```
//!
//! Every model reply is appended to the conversation. A reply with tool
//! calls sends the agent through the executor, one call at a time in the
//! order given; a reply without tool calls ends the run. The loop also
//! stops at `max_iterations` model calls or when the run is cancelled.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::AgentContext;
use crate::conversation::Conversation;
use crate::error::AgentError;
use crate::tools::executor::{ToolExecutor, ToolStatus};
use crate::tools::ToolRegistry;
use crate::types::{AgentInput, ChatRequest, Message, TokenUsage};

/// Returned instead of an empty final answer.
pub const NO_CONTENT_RESPONSE: &str = "[No content in model response]";

/// One dispatched tool call, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ToolLogEntry {
    pub id: String,
    pub name: String,
    pub status: ToolStatus,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRun {
    pub answer: String,
    pub messages: Vec<Message>,
    /// Number of model calls made
    pub iterations: u32,
    pub usage: TokenUsage,
    pub tool_log: Vec<ToolLogEntry>,
}

/// The Agent holds the shared context and the tool executor. It keeps no
/// per-run state, so one Agent can serve concurrent runs.
pub struct Agent {
    ctx: Arc<AgentContext>,
    executor: ToolExecutor,
}

impl Agent {
    pub fn new(ctx: Arc<AgentContext>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            ctx,
            executor: ToolExecutor::new(registry),
        }
    }

    /// Run one request to completion and return the final answer.
    pub async fn run(
        &self,
        input: impl Into<AgentInput>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.run_with_transcript(input, cancel)
            .await
            .map(|run| run.answer)
    }

    /// Like [`Agent::run`], but also hands back the transcript and stats.
    pub async fn run_with_transcript(
        &self,
        input: impl Into<AgentInput>,
        cancel: &CancellationToken,
    ) -> Result<AgentRun, AgentError> {
        let config = &self.ctx.config;
        let mut conversation = Conversation::seed(input.into(), &config.agent.system_prompt)?;
        let tools = self.executor.registry().definitions();
        let max_iterations = config.agent.max_iterations;

        let mut iterations = 0;
        let mut usage = TokenUsage::default();
        let mut tool_log = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if iterations >= max_iterations {
                return Err(AgentError::MaxIterations(max_iterations));
            }
            iterations += 1;

            let request = ChatRequest {
                model: config.llm.model.clone(),
                messages: conversation.messages().to_vec(),
                tools: tools.clone(),
                max_tokens: config.llm.max_tokens,
                response_format: None,
            };

            info!(iteration = iterations, provider = self.ctx.llm.name(), "calling model");
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                response = self.ctx.llm.chat_completion(&request) => {
                    response.map_err(AgentError::Model)?
                }
            };
            if let Some(u) = &response.usage {
                usage.add(u);
            }

            if !response.has_tool_calls() {
                let answer = if response.content.trim().is_empty() {
                    NO_CONTENT_RESPONSE.to_string()
                } else {
                    response.content.clone()
                };
                conversation.push(response.into_message());
                info!(
                    iterations,
                    messages = conversation.len(),
                    tool_calls = tool_log.len(),
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "run finished"
                );
                return Ok(AgentRun {
                    answer,
                    messages: conversation.into_messages(),
                    iterations,
                    usage,
                    tool_log,
                });
            }

            let calls = response.tool_calls.clone();
            conversation.push(response.into_message());
            info!(tool_calls = calls.len(), "received model response");

            for call in &calls {
                info!(tool = %call.name, id = %call.id, "dispatching tool call");
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                    result = self.executor.execute(call) => result,
                };
                debug!(tool = %call.name, status = ?result.status, bytes = result.content.len(), "tool finished");
                tool_log.push(ToolLogEntry {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    status: result.status,
                });
                conversation.push(result.into_message());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::scripted::{calls, text, ScriptedProvider};
    use crate::tools::lookup::LookupSalesDataTool;
    use crate::tools::testing::{registry, write_sales_fixture};
    use crate::types::{ChatResponse, Role, ToolCall};

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Runtime::new().unwrap()
    }

    fn agent_with(provider: Arc<ScriptedProvider>, max_iterations: u32) -> Agent {
        let mut config = AppConfig::default();
        config.agent.max_iterations = max_iterations;
        let ctx = Arc::new(AgentContext::new(provider, config));
        Agent::new(ctx, Arc::new(registry()))
    }

    #[test]
    fn test_plain_answer_makes_one_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("Hello there")]));
        let agent = agent_with(provider.clone(), 5);
        let run = rt()
            .block_on(agent.run_with_transcript("hi", &CancellationToken::new()))
            .unwrap();

        assert_eq!(run.answer, "Hello there");
        assert_eq!(run.iterations, 1);
        assert_eq!(run.messages.len(), 3);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let first = &requests[0].messages;
        assert_eq!(first.len(), 2);
        assert_eq!(first.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(first.iter().filter(|m| m.role == Role::User).count(), 1);
        let tool_names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tool_names, vec!["echo", "explode"]);
    }

    #[test]
    fn test_supplied_system_is_not_duplicated() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("ok")]));
        let agent = agent_with(provider.clone(), 5);
        let input = vec![Message::system("custom"), Message::user("hi")];
        rt().block_on(agent.run(input, &CancellationToken::new()))
            .unwrap();

        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(sent[0].content, "custom");
    }

    #[test]
    fn test_batch_results_follow_request_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(&[
                ("c1", "echo", r#"{"text":"one"}"#),
                ("c2", "explode", "{}"),
                ("c3", "echo", r#"{"text":"three"}"#),
            ]),
            text("done"),
        ]));
        let agent = agent_with(provider.clone(), 5);
        let run = rt()
            .block_on(agent.run_with_transcript("go", &CancellationToken::new()))
            .unwrap();

        assert_eq!(run.answer, "done");
        // system, user, assistant(3 calls), 3 tool results, final assistant
        assert_eq!(run.messages.len(), 7);
        let results: Vec<(&str, &str)> = run.messages[3..6]
            .iter()
            .map(|m| {
                assert_eq!(m.role, Role::Tool);
                (m.tool_call_id.as_deref().unwrap(), m.content.as_str())
            })
            .collect();
        assert_eq!(
            results,
            vec![
                ("c1", "echo: one"),
                ("c2", "Error: tool 'explode' failed: kaboom"),
                ("c3", "echo: three"),
            ]
        );
        let statuses: Vec<ToolStatus> = run.tool_log.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![ToolStatus::Success, ToolStatus::Failed, ToolStatus::Success]
        );

        // the second model call sees every tool result
        let second = &provider.requests()[1].messages;
        assert_eq!(second.len(), 6);
    }

    #[test]
    fn test_unknown_tool_does_not_stop_the_loop() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(&[("c1", "lookup_weather", "{}")]),
            calls(&[("c2", "echo", r#"{"text":"retry"}"#)]),
            text("recovered"),
        ]));
        let agent = agent_with(provider.clone(), 5);
        let run = rt()
            .block_on(agent.run_with_transcript("go", &CancellationToken::new()))
            .unwrap();

        assert_eq!(run.answer, "recovered");
        assert_eq!(run.iterations, 3);
        assert!(run.messages[3].content.contains("unknown tool 'lookup_weather'"));
        assert_eq!(run.messages[5].content, "echo: retry");
    }

    #[test]
    fn test_store_lookup_runs_through_the_real_tool() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_sales_fixture(dir.path());
        let with_usage = |response: anyhow::Result<ChatResponse>| {
            response.map(|mut r| {
                r.usage = Some(TokenUsage { input_tokens: 40, output_tokens: 5 });
                r
            })
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            with_usage(calls(&[(
                "call_lookup",
                "lookup_sales_data",
                r#"{"prompt":"Show me all the sales for store 1320 on November 1st, 2021"}"#,
            )])),
            text(
                "SELECT SKU_Coded, Total_Sale_Value FROM sales \
                 WHERE Store_Number = 1320 AND Sold_Date = '2021-11-01' ORDER BY SKU_Coded",
            ),
            with_usage(text("Store 1320 sold two SKUs on November 1st, 2021.")),
        ]));

        let mut config = AppConfig::default();
        config.data.dataset_path = dataset;
        let ctx = Arc::new(AgentContext::new(provider.clone(), config));
        let registry = ToolRegistry::new(vec![Box::new(LookupSalesDataTool::new(ctx.clone()))])
            .unwrap();
        let agent = Agent::new(ctx, Arc::new(registry));

        let run = rt()
            .block_on(agent.run_with_transcript(
                "Show me all the sales for store 1320 on November 1st, 2021",
                &CancellationToken::new(),
            ))
            .unwrap();

        assert_eq!(run.answer, "Store 1320 sold two SKUs on November 1st, 2021.");
        let roles: Vec<Role> = run.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert_eq!(run.messages[2].tool_calls[0].name, "lookup_sales_data");
        assert_eq!(run.messages[3].tool_call_id.as_deref(), Some("call_lookup"));

        let table = &run.messages[3].content;
        assert!(table.contains("SKU_Coded"));
        assert!(table.contains("6200173"));
        assert!(table.contains("6200174"));
        assert!(!table.starts_with("Error"));
        assert_eq!(run.tool_log[0].status, ToolStatus::Success);

        // two agent round-trips plus the nested SQL generation call
        assert_eq!(run.iterations, 2);
        assert_eq!(provider.requests().len(), 3);
        assert_eq!(run.usage, TokenUsage { input_tokens: 80, output_tokens: 10 });
    }

    #[test]
    fn test_empty_answer_uses_sentinel() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("")]));
        let agent = agent_with(provider, 5);
        let answer = rt()
            .block_on(agent.run("hi", &CancellationToken::new()))
            .unwrap();
        assert_eq!(answer, NO_CONTENT_RESPONSE);
    }

    #[test]
    fn test_max_iterations_is_a_distinct_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            calls(&[("c1", "echo", r#"{"text":"a"}"#)]),
            calls(&[("c2", "echo", r#"{"text":"b"}"#)]),
            text("never reached"),
        ]));
        let agent = agent_with(provider.clone(), 2);
        let err = rt()
            .block_on(agent.run("loop", &CancellationToken::new()))
            .unwrap_err();
        assert!(matches!(err, AgentError::MaxIterations(2)));
        assert_eq!(provider.requests().len(), 2);
    }

    #[test]
    fn test_model_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(anyhow::anyhow!(
            "connection refused"
        ))]));
        let agent = agent_with(provider, 5);
        let err = rt()
            .block_on(agent.run("hi", &CancellationToken::new()))
            .unwrap_err();
        assert!(matches!(err, AgentError::Model(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_cancelled_before_first_call() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("unused")]));
        let agent = agent_with(provider.clone(), 5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = rt().block_on(agent.run("hi", &cancel)).unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(provider.requests().is_empty());
    }

    #[test]
    fn test_empty_request_still_reaches_the_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![text("What would you like to know?")]));
        let agent = agent_with(provider.clone(), 5);
        let answer = rt()
            .block_on(agent.run("", &CancellationToken::new()))
            .unwrap();
        assert_eq!(answer, "What would you like to know?");
        let sent = &provider.requests()[0].messages;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], Message::user(""));
    }

    #[test]
    fn test_invalid_input_is_reported() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent_with(provider.clone(), 5);
        let err = rt()
            .block_on(agent.run(Vec::<Message>::new(), &CancellationToken::new()))
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
        assert!(provider.requests().is_empty());
    }

    #[test]
    fn test_usage_is_accumulated() {
        let with_usage = |response: anyhow::Result<ChatResponse>, input, output| {
            response.map(|mut r| {
                r.usage = Some(TokenUsage { input_tokens: input, output_tokens: output });
                r
            })
        };
        let provider = Arc::new(ScriptedProvider::new(vec![
            with_usage(calls(&[("c1", "echo", r#"{"text":"x"}"#)]), 100, 10),
            with_usage(text("fin"), 150, 20),
        ]));
        let agent = agent_with(provider, 5);
        let run = rt()
            .block_on(agent.run_with_transcript("hi", &CancellationToken::new()))
            .unwrap();
        assert_eq!(run.usage, TokenUsage { input_tokens: 250, output_tokens: 30 });
        assert_eq!(
            run.messages[2].tool_calls,
            vec![ToolCall {
                id: "c1".into(),
                name: "echo".into(),
                arguments: r#"{"text":"x"}"#.into()
            }]
        );
    }
}
