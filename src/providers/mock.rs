use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use super::base::{Provider, Usage};
use super::utils::tool_result_fragment;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

/// A scripted provider that replays canned responses for loop tests.
///
/// Responses use a minimal private wire shape:
/// `{"text": .., "tool_calls": [{"id", "name", "arguments"}],
///   "complete": bool, "usage": {"input_tokens", "output_tokens"}}`
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Value>>>,
    fallback: Value,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Replay the given responses in order; once exhausted, an empty
    /// complete response is returned
    pub fn new(responses: Vec<Value>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            fallback: json!({ "text": "", "complete": true }),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replay the same response forever, for tests that exercise the
    /// iteration ceiling
    pub fn repeating(response: Value) -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            fallback: response,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Conversations observed by each call, for asserting what the loop sent
    pub fn requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        _tools: &[Tool],
        _system_prompt: &str,
    ) -> Result<Value> {
        self.requests.lock().unwrap().push(messages.to_vec());

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.fallback.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall> {
        response
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .map(|call| {
                        ToolCall::new(
                            call.get("id").and_then(Value::as_str).unwrap_or_default(),
                            call.get("name").and_then(Value::as_str).unwrap_or_default(),
                            call.get("arguments").cloned().unwrap_or_else(|| json!({})),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn format_tool_result(&self, call_id: &str, tool_name: &str, content: &str) -> Value {
        tool_result_fragment(call_id, tool_name, content)
    }

    fn is_complete(&self, response: &Value) -> bool {
        match response.get("complete").and_then(Value::as_bool) {
            Some(complete) => complete,
            None => self.parse_tool_calls(response).is_empty(),
        }
    }

    fn extract_final_response(&self, response: &Value) -> String {
        response
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn format_assistant_message(&self, response: &Value) -> Message {
        Message::assistant().with_items(vec![response.clone()])
    }

    fn get_usage(&self, response: &Value) -> Usage {
        let usage = response.get("usage");
        let read = |key: &str| {
            usage
                .and_then(|u| u.get(key))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Usage::new(read("input_tokens"), read("output_tokens"))
    }
}
