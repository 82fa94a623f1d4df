//! The agent reasoning loop.
//!
//! One [`Executor::run`] answers one user message: the model is called with
//! the tool declarations, any tool calls it makes are executed and fed back,
//! and the loop repeats until the model answers in plain text or a ceiling
//! is reached.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use contractlens_config::AppConfig;
use contractlens_core::error::{Error, ToolError};
use contractlens_core::event::{DomainEvent, EventBus};
use contractlens_core::message::{ConversationId, Message, MessageToolCall};
use contractlens_core::provider::{Provider, ProviderRequest, Usage};
use contractlens_core::tool::{ToolCall, ToolRegistry};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const CALL_LIMIT_NOTE: &str = "The tool-call limit for this question has been reached. \
    Do not request any more tools. Give the best answer you can from the information \
    gathered so far, and say what could not be checked.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools
    Completed,
    /// A ceiling was hit and the answer came from the final tool-less call
    CallLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    pub answer: String,
    pub stop_reason: StopReason,
    /// LLM calls made, including the final tool-less one
    pub iterations: u32,
    pub tool_calls: Vec<ToolInvocation>,
    pub usage: Usage,
}

/// Orchestrates LLM calls and tool execution for a single turn.
pub struct Executor {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    max_iterations: u32,
    max_tool_calls: u32,
    max_tool_output_chars: usize,
    event_bus: Arc<EventBus>,
}

impl Executor {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: None,
            tools,
            system_prompt: String::new(),
            max_iterations: 6,
            max_tool_calls: 12,
            max_tool_output_chars: 8000,
            event_bus,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(provider, &config.default_model, tools, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_system_prompt(&config.agent.system_prompt)
            .with_limits(config.agent.max_iterations, config.agent.max_tool_calls)
            .with_max_tool_output_chars(config.agent.max_tool_output_chars)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Ceilings on tool-capable LLM calls and on tool executions per run.
    pub fn with_limits(mut self, max_iterations: u32, max_tool_calls: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn with_max_tool_output_chars(mut self, max: usize) -> Self {
        self.max_tool_output_chars = max;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Answer `user_message` given the prior `history` of the session.
    ///
    /// Tool failures are reported back to the model and never abort the run;
    /// provider failures do.
    pub async fn run(
        &self,
        conversation_id: &ConversationId,
        history: &[Message],
        user_message: &str,
    ) -> Result<AgentOutcome, Error> {
        info!(
            conversation_id = %conversation_id,
            history = history.len(),
            model = %self.model,
            "Processing message"
        );

        let mut context = Vec::with_capacity(history.len() + 2);
        if !self.system_prompt.is_empty() {
            context.push(Message::system(&self.system_prompt));
        }
        context.extend_from_slice(history);
        context.push(Message::user(user_message));

        let definitions = self.tools.definitions();
        let mut usage = Usage::default();
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut iterations = 0u32;
        let mut tool_budget = self.max_tool_calls as usize;

        while iterations < self.max_iterations && tool_budget > 0 {
            iterations += 1;
            debug!(
                conversation_id = %conversation_id,
                iteration = iterations,
                "Agent loop iteration"
            );

            let request = ProviderRequest {
                model: self.model.clone(),
                messages: context.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
                tools: definitions.clone(),
            };
            let response = self.complete(conversation_id, request).await?;
            if let Some(u) = &response.usage {
                usage.add(u);
            }

            if response.message.tool_calls.is_empty() {
                return Ok(self.finish(
                    conversation_id,
                    response.message.content,
                    StopReason::Completed,
                    iterations,
                    invocations,
                    usage,
                ));
            }

            let requested = response.message.tool_calls.clone();
            debug!(tool_count = requested.len(), budget = tool_budget, "Executing tool calls");
            context.push(Message::assistant_with_tools(
                response.message.content,
                requested.clone(),
            ));

            let allowed = requested.len().min(tool_budget);
            let (to_run, over_budget) = requested.split_at(allowed);
            tool_budget -= allowed;

            let results = join_all(to_run.iter().map(|tc| self.execute_tool(tc))).await;
            for (tc, (message, invocation)) in to_run.iter().zip(results) {
                self.event_bus.publish(DomainEvent::ToolExecuted {
                    tool_name: tc.name.clone(),
                    success: invocation.success,
                    duration_ms: invocation.duration_ms,
                    timestamp: Utc::now(),
                });
                context.push(message);
                invocations.push(invocation);
            }
            for tc in over_budget {
                warn!(
                    tool = %tc.name,
                    limit = self.max_tool_calls,
                    "Tool call over budget, not executed"
                );
                context.push(Message::tool_result(
                    &tc.id,
                    format!(
                        "Error: tool call limit of {} reached; this call was not executed",
                        self.max_tool_calls
                    ),
                ));
            }
        }

        warn!(
            conversation_id = %conversation_id,
            iterations,
            tool_calls = invocations.len(),
            "Call ceiling reached, requesting final answer without tools"
        );
        context.push(Message::system(CALL_LIMIT_NOTE));
        iterations += 1;
        let request = ProviderRequest {
            model: self.model.clone(),
            messages: context,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: Vec::new(),
        };
        let response = self.complete(conversation_id, request).await?;
        if let Some(u) = &response.usage {
            usage.add(u);
        }
        Ok(self.finish(
            conversation_id,
            response.message.content,
            StopReason::CallLimit,
            iterations,
            invocations,
            usage,
        ))
    }

    async fn complete(
        &self,
        conversation_id: &ConversationId,
        request: ProviderRequest,
    ) -> Result<contractlens_core::provider::ProviderResponse, Error> {
        self.provider.complete(request).await.map_err(|e| {
            warn!(
                conversation_id = %conversation_id,
                provider = self.provider.name(),
                error = %e,
                "LLM call failed"
            );
            self.event_bus.publish(DomainEvent::ErrorOccurred {
                context: format!("provider:{}", self.provider.name()),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
            Error::Provider(e)
        })
    }

    /// Run one call, turning every failure into an `Error: ...` tool message.
    async fn execute_tool(&self, tc: &MessageToolCall) -> (Message, ToolInvocation) {
        let start = Instant::now();
        let outcome = match parse_arguments(&tc.arguments) {
            Ok(arguments) => {
                let call = ToolCall { id: tc.id.clone(), name: tc.name.clone(), arguments };
                self.tools.execute(&call).await
            }
            Err(e) => Err(e),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let (content, success) = match outcome {
            Ok(result) if result.success => {
                (truncate_output(&result.output, self.max_tool_output_chars), true)
            }
            Ok(result) => {
                let reason = result.output.strip_prefix("Error: ").unwrap_or(&result.output);
                (format!("Error: {}", truncate_output(reason, self.max_tool_output_chars)), false)
            }
            Err(e) => {
                warn!(tool = %tc.name, error = %e, "Tool execution failed");
                (format!("Error: {e}"), false)
            }
        };

        debug!(tool = %tc.name, success, duration_ms, "Tool finished");
        (
            Message::tool_result(&tc.id, content),
            ToolInvocation { name: tc.name.clone(), success, duration_ms },
        )
    }

    fn finish(
        &self,
        conversation_id: &ConversationId,
        answer: String,
        stop_reason: StopReason,
        iterations: u32,
        tool_calls: Vec<ToolInvocation>,
        usage: Usage,
    ) -> AgentOutcome {
        self.event_bus.publish(DomainEvent::ResponseGenerated {
            conversation_id: conversation_id.to_string(),
            model: self.model.clone(),
            iterations,
            tokens_used: usage.total_tokens,
            timestamp: Utc::now(),
        });
        info!(
            conversation_id = %conversation_id,
            ?stop_reason,
            iterations,
            tool_calls = tool_calls.len(),
            tokens = usage.total_tokens,
            "Answer ready"
        );
        AgentOutcome { answer, stop_reason, iterations, tool_calls, usage }
    }
}

/// Models send arguments as a JSON string; an empty string means `{}`.
fn parse_arguments(raw: &str) -> Result<serde_json::Value, ToolError> {
    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
        .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))
}

/// Cut `output` to `max_chars` characters, noting how much was dropped.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let kept: String = output.chars().take(max_chars).collect();
    format!("{kept}\n[truncated {} chars]", total - max_chars)
}
