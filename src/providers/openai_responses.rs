use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::tool_result_fragment;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// OpenAI adapter speaking the Responses API: typed input items in, typed
/// output items back, instructions on their own parameter.
pub struct OpenAiResponsesProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

fn temperature_for(model: &str) -> f32 {
    if model == "gpt-5-mini" || model == "gpt-5-nano" {
        1.0
    } else {
        0.7
    }
}

impl OpenAiResponsesProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn tools_to_responses_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "name": tool.name,
                    "description": tool.description,
                    "parameters": tool.input_schema,
                })
            })
            .collect()
    }

    /// Rebuild the typed input list. Function-call stubs and their outputs
    /// are replayed as dedicated input items referencing the call id.
    fn messages_to_input_spec(messages: &[Message]) -> Vec<Value> {
        let mut input = Vec::new();

        for message in messages {
            match (message.role, &message.content) {
                // Instructions ride via the instructions parameter
                (Role::System, _) => continue,
                (Role::User, MessageContent::Text(text)) => input.push(json!({
                    "type": "message",
                    "role": "user",
                    "content": [{ "type": "input_text", "text": text }],
                })),
                (Role::Assistant, MessageContent::Items(items)) => {
                    for item in items {
                        if item.get("type").and_then(Value::as_str) == Some("function_call") {
                            input.push(json!({
                                "type": "function_call",
                                "call_id": item
                                    .get("call_id")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                                "name": item.get("name").cloned().unwrap_or_else(|| json!("")),
                                "arguments": item
                                    .get("arguments")
                                    .cloned()
                                    .unwrap_or_else(|| json!("{}")),
                            }));
                        }
                    }
                }
                (_, MessageContent::Items(items)) => {
                    for item in items {
                        if item.get("type").and_then(Value::as_str) == Some("tool_result") {
                            input.push(json!({
                                "type": "function_call_output",
                                "call_id": item
                                    .get("tool_use_id")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                                "output": item
                                    .get("content")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                            }));
                        }
                    }
                }
                _ => {}
            }
        }

        input
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/responses", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            _ => Err(anyhow!(
                "Request failed: {}\nPayload: {}",
                response.status(),
                payload
            )),
        }
    }

    fn output_items(response: &Value) -> &[Value] {
        response
            .get("output")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Provider for OpenAiResponsesProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[Tool],
        system_prompt: &str,
    ) -> Result<Value> {
        let mut payload = json!({
            "model": self.config.model,
            "input": Self::messages_to_input_spec(messages),
            "instructions": system_prompt,
            "max_output_tokens": self.config.max_tokens,
            "temperature": temperature_for(&self.config.model),
            // Don't store responses server-side
            "store": false,
        });

        if !tools.is_empty() {
            let object = payload.as_object_mut().unwrap();
            object.insert(
                "tools".to_string(),
                json!(Self::tools_to_responses_spec(tools)),
            );
            object.insert("tool_choice".to_string(), json!("auto"));
        }

        self.post(payload).await
    }

    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall> {
        let mut tool_calls = Vec::new();

        for item in Self::output_items(response) {
            if item.get("type").and_then(Value::as_str) == Some("function_call") {
                let arguments = item.get("arguments").and_then(Value::as_str).unwrap_or_default();
                let arguments =
                    serde_json::from_str::<Value>(arguments).unwrap_or_else(|_| json!({}));

                tool_calls.push(ToolCall::new(
                    item.get("call_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                    item.get("name").and_then(Value::as_str).unwrap_or_default(),
                    arguments,
                ));
            }
        }

        tool_calls
    }

    fn format_tool_result(&self, call_id: &str, tool_name: &str, content: &str) -> Value {
        tool_result_fragment(call_id, tool_name, content)
    }

    /// The status field is checked first; even a completed response is not
    /// terminal while function-call items are pending
    fn is_complete(&self, response: &Value) -> bool {
        if response.get("status").and_then(Value::as_str) != Some("completed") {
            return false;
        }

        !Self::output_items(response)
            .iter()
            .any(|item| item.get("type").and_then(Value::as_str) == Some("function_call"))
    }

    fn extract_final_response(&self, response: &Value) -> String {
        let mut text = String::new();

        for item in Self::output_items(response) {
            if item.get("type").and_then(Value::as_str) == Some("message")
                && item.get("role").and_then(Value::as_str) == Some("assistant")
            {
                if let Some(content) = item.get("content").and_then(Value::as_array) {
                    for part in content {
                        if part.get("type").and_then(Value::as_str) == Some("output_text") {
                            text.push_str(part.get("text").and_then(Value::as_str).unwrap_or(""));
                        }
                    }
                }
            }
        }

        text
    }

    fn format_assistant_message(&self, response: &Value) -> Message {
        let mut items = Vec::new();

        for item in Self::output_items(response) {
            match item.get("type").and_then(Value::as_str) {
                Some("message") if item.get("role").and_then(Value::as_str) == Some("assistant") => {
                    if let Some(content) = item.get("content").and_then(Value::as_array) {
                        for part in content {
                            if part.get("type").and_then(Value::as_str) == Some("output_text") {
                                items.push(json!({
                                    "type": "text",
                                    "text": part.get("text").cloned().unwrap_or_else(|| json!("")),
                                }));
                            }
                        }
                    }
                }
                Some("function_call") => items.push(json!({
                    "type": "function_call",
                    "call_id": item.get("call_id").cloned().unwrap_or_else(|| json!("")),
                    "name": item.get("name").cloned().unwrap_or_else(|| json!("")),
                    "arguments": item.get("arguments").cloned().unwrap_or_else(|| json!("{}")),
                })),
                _ => {}
            }
        }

        Message::assistant().with_items(items)
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
