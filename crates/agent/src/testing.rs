//! Scripted LLM stand-in for executor and gateway tests.
//! Enabled by the `testing` feature.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use contractlens_core::error::ProviderError;
use contractlens_core::message::{Message, MessageToolCall};
use contractlens_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};

/// Returns scripted responses in order and records every request.
///
/// Once the script runs out, calls fail with `InvalidResponse` (or with the
/// error given to [`ScriptedProvider::failing`]).
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
    exhausted: Option<ProviderError>,
    delay: Duration,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            exhausted: None,
            delay: Duration::ZERO,
        }
    }

    /// Each call sleeps `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every call fails with `error`.
    pub fn failing(error: ProviderError) -> Self {
        Self { exhausted: Some(error), ..Self::new(Vec::new()) }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.responses.lock().ok().and_then(|mut r| r.pop_front());
        match (next, &self.exhausted) {
            (Some(response), _) => Ok(response),
            (None, Some(err)) => Err(err.clone()),
            (None, None) => Err(ProviderError::InvalidResponse(
                "scripted provider has no more responses".into(),
            )),
        }
    }
}

fn usage() -> Option<Usage> {
    Some(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 })
}

/// A final answer.
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// An assistant turn that requests `calls`.
pub fn tool_call_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools("", calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: args.to_string(),
    }
}
