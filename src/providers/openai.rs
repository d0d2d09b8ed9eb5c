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

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

// gpt-5-mini and gpt-5-nano only accept the default temperature
fn temperature_for(model: &str) -> f32 {
    if model == "gpt-5-mini" || model == "gpt-5-nano" {
        1.0
    } else {
        0.7
    }
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn tools_to_openai_spec(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.input_schema,
                    }
                })
            })
            .collect()
    }

    /// Rebuild the chat message array from the conversation. Assistant
    /// fragments become content plus a native tool_calls array; tool results
    /// become dedicated role-tagged messages referencing the call id.
    fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
        let mut spec = Vec::new();

        for message in messages {
            match (message.role, &message.content) {
                // Instructions are prepended separately
                (Role::System, _) => continue,
                (role, MessageContent::Text(text)) => {
                    spec.push(json!({ "role": role, "content": text }));
                }
                (Role::Assistant, MessageContent::Items(items)) => {
                    let mut converted = json!({ "role": "assistant" });
                    let mut tool_calls = Vec::new();
                    for item in items {
                        match item.get("type").and_then(Value::as_str) {
                            Some("text") => {
                                converted["content"] =
                                    item.get("text").cloned().unwrap_or_else(|| json!(""));
                            }
                            Some("tool_call") => tool_calls.push(json!({
                                "id": item.get("id").cloned().unwrap_or_else(|| json!("")),
                                "type": "function",
                                "function": {
                                    "name": item
                                        .get("name")
                                        .cloned()
                                        .unwrap_or_else(|| json!("")),
                                    "arguments": item
                                        .get("arguments")
                                        .cloned()
                                        .unwrap_or_else(|| json!("{}")),
                                }
                            })),
                            _ => {}
                        }
                    }
                    if !tool_calls.is_empty() {
                        converted["tool_calls"] = json!(tool_calls);
                    }
                    spec.push(converted);
                }
                (_, MessageContent::Items(items)) => {
                    for item in items {
                        if item.get("type").and_then(Value::as_str) == Some("tool_result") {
                            spec.push(json!({
                                "role": "tool",
                                "tool_call_id": item
                                    .get("tool_use_id")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                                "name": item
                                    .get("tool_name")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                                "content": item
                                    .get("content")
                                    .cloned()
                                    .unwrap_or_else(|| json!("")),
                            }));
                        }
                    }
                }
            }
        }

        spec
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

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
                // Implement retry logic here if needed
                Err(anyhow!("Server error: {}", status))
            }
            _ => Err(anyhow!(
                "Request failed: {}\nPayload: {}",
                response.status(),
                payload
            )),
        }
    }

    fn message(response: &Value) -> &Value {
        &response["choices"][0]["message"]
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[Tool],
        system_prompt: &str,
    ) -> Result<Value> {
        let system_message = json!({
            "role": "system",
            "content": system_prompt
        });

        let mut messages_array = vec![system_message];
        messages_array.extend(Self::messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "max_completion_tokens": self.config.max_tokens,
            "temperature": temperature_for(&self.config.model),
        });

        if !tools.is_empty() {
            let object = payload.as_object_mut().unwrap();
            object.insert("tools".to_string(), json!(Self::tools_to_openai_spec(tools)));
            object.insert("tool_choice".to_string(), json!("auto"));
        }

        self.post(payload).await
    }

    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall> {
        let mut tool_calls = Vec::new();

        let calls = match Self::message(response).get("tool_calls").and_then(Value::as_array) {
            Some(calls) => calls,
            None => return tool_calls,
        };

        for call in calls {
            let arguments = call["function"]["arguments"].as_str().unwrap_or_default();
            // A malformed argument payload degrades to an empty object
            // rather than failing the turn
            let arguments =
                serde_json::from_str::<Value>(arguments).unwrap_or_else(|_| json!({}));

            tool_calls.push(ToolCall::new(
                call.get("id").and_then(Value::as_str).unwrap_or_default(),
                call["function"]["name"].as_str().unwrap_or_default(),
                arguments,
            ));
        }

        tool_calls
    }

    fn format_tool_result(&self, call_id: &str, tool_name: &str, content: &str) -> Value {
        tool_result_fragment(call_id, tool_name, content)
    }

    /// "stop" is terminal; any other finish reason is only terminal when the
    /// message carries no tool calls
    fn is_complete(&self, response: &Value) -> bool {
        let choices = match response.get("choices").and_then(Value::as_array) {
            Some(choices) if !choices.is_empty() => choices,
            _ => return true,
        };

        if choices[0].get("finish_reason").and_then(Value::as_str) == Some("stop") {
            return true;
        }

        choices[0]["message"]
            .get("tool_calls")
            .and_then(Value::as_array)
            .map_or(true, |calls| calls.is_empty())
    }

    fn extract_final_response(&self, response: &Value) -> String {
        Self::message(response)
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    fn format_assistant_message(&self, response: &Value) -> Message {
        let message = Self::message(response);
        let mut items = Vec::new();

        if let Some(text) = message.get("content").and_then(Value::as_str) {
            if !text.is_empty() {
                items.push(json!({ "type": "text", "text": text }));
            }
        }

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                // Arguments stay as the raw vendor string so the stub can be
                // replayed verbatim on the next call
                items.push(json!({
                    "type": "tool_call",
                    "id": call.get("id").cloned().unwrap_or_else(|| json!("")),
                    "name": call["function"]["name"].clone(),
                    "arguments": call["function"]["arguments"].clone(),
                }));
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
        Usage::new(read("prompt_tokens"), read("completion_tokens"))
    }
}
