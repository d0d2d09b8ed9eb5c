use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::base::{Provider, Usage};
use super::configs::AnthropicProviderConfig;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

pub const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    /// Conversation messages map straight onto the native shape: text is a
    /// plain content string, fragment lists (tool_use stubs, tool_result
    /// blocks) are already native blocks and pass through untouched.
    fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
        let mut spec = Vec::new();

        for message in messages {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                // Instructions ride via the top-level system field
                Role::System => continue,
            };
            let content = match &message.content {
                MessageContent::Text(text) => json!(text),
                MessageContent::Items(items) => json!(items),
            };
            spec.push(json!({ "role": role, "content": content }));
        }

        spec
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let error_text = response.text().await?;
                Err(anyhow!(
                    "Request failed: {} - {}",
                    status,
                    error_text
                ))
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
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
            "max_tokens": self.config.max_tokens,
            "system": system_prompt,
            "messages": Self::messages_to_anthropic_spec(messages),
        });

        // Tool declarations serialize directly to the native tool shape
        if !tools.is_empty() {
            payload
                .as_object_mut()
                .unwrap()
                .insert("tools".to_string(), json!(tools));
        }

        self.post(payload).await
    }

    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall> {
        let mut tool_calls = Vec::new();

        let blocks = match response.get("content").and_then(Value::as_array) {
            Some(blocks) => blocks,
            None => return tool_calls,
        };

        for block in blocks {
            if block.get("type").and_then(Value::as_str) == Some("tool_use") {
                tool_calls.push(ToolCall::new(
                    block.get("id").and_then(Value::as_str).unwrap_or_default(),
                    block
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default(),
                    block.get("input").cloned().unwrap_or_else(|| json!({})),
                ));
            }
        }

        tool_calls
    }

    fn format_tool_result(&self, call_id: &str, _tool_name: &str, content: &str) -> Value {
        json!({
            "type": "tool_result",
            "tool_use_id": call_id,
            "content": content,
        })
    }

    /// end_turn is the terminal stop reason; tool_use means pending calls,
    /// and anything else means the turn is unfinished
    fn is_complete(&self, response: &Value) -> bool {
        response.get("stop_reason").and_then(Value::as_str) == Some("end_turn")
    }

    fn extract_final_response(&self, response: &Value) -> String {
        match response.get("content").and_then(Value::as_array) {
            Some(blocks) => blocks
                .iter()
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .collect(),
            None => String::new(),
        }
    }

    fn format_assistant_message(&self, response: &Value) -> Message {
        let items = response
            .get("content")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup_mock_server(response_body: Value) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(response_body))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 4096,
        };

        let provider = AnthropicProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "{\"temperature\": 12}"
            }],
            "model": "claude-haiku-4-5",
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 12, "output_tokens": 15 }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let messages = vec![Message::user().with_text("Weather in Paris?")];
        let response = provider
            .complete_with_tools(&messages, &[], "You are a weather service.")
            .await?;

        assert!(provider.is_complete(&response));
        assert!(provider.parse_tool_calls(&response).is_empty());
        assert_eq!(
            provider.extract_final_response(&response),
            "{\"temperature\": 12}"
        );
        assert_eq!(provider.get_usage(&response), Usage::new(12, 15));

        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_use() -> Result<()> {
        let response_body = json!({
            "id": "msg_tool",
            "type": "message",
            "role": "assistant",
            "content": [
                { "type": "text", "text": "Looking that up." },
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "get_weather",
                    "input": { "latitude": 48.85, "longitude": 2.35 }
                }
            ],
            "model": "claude-haiku-4-5",
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 20, "output_tokens": 18 }
        });

        let (_, provider) = setup_mock_server(response_body).await;

        let tool = Tool::new(
            "get_weather",
            "Gets the current weather",
            json!({
                "type": "object",
                "properties": {
                    "latitude": {"type": "number"},
                    "longitude": {"type": "number"}
                },
                "required": ["latitude", "longitude"]
            }),
        );

        let messages = vec![Message::user().with_text("Weather in Paris?")];
        let response = provider
            .complete_with_tools(&messages, &[tool], "You are a weather service.")
            .await?;

        assert!(!provider.is_complete(&response));
        let calls = provider.parse_tool_calls(&response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "toolu_01");
        assert_eq!(calls[0].name, "get_weather");
        assert_eq!(
            calls[0].arguments,
            json!({"latitude": 48.85, "longitude": 2.35})
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_server_error() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let config = AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 4096,
        };
        let provider = AnthropicProvider::new(config)?;

        let messages = vec![Message::user().with_text("Hello?")];
        let result = provider
            .complete_with_tools(&messages, &[], "You are a helpful assistant.")
            .await;

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Server error: 500"));

        Ok(())
    }

    #[test]
    fn test_tool_round_trip_preserves_call_id() {
        let config = AnthropicProviderConfig {
            host: "http://localhost".to_string(),
            api_key: "test_api_key".to_string(),
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 4096,
        };
        let provider = AnthropicProvider::new(config).unwrap();

        let response = json!({
            "content": [{
                "type": "tool_use",
                "id": "toolu_42",
                "name": "geocode",
                "input": { "query": "Antwerp" }
            }],
            "stop_reason": "tool_use"
        });

        let assistant = provider.format_assistant_message(&response);
        let result = provider.format_tool_result("toolu_42", "geocode", "51.2N, 4.4E");
        let tool_message = Message::user().with_items(vec![result]);

        let spec = AnthropicProvider::messages_to_anthropic_spec(&[assistant, tool_message]);
        assert_eq!(spec.len(), 2);
        assert_eq!(spec[0]["role"], "assistant");
        assert_eq!(spec[0]["content"][0]["id"], "toolu_42");
        assert_eq!(spec[1]["role"], "user");
        assert_eq!(spec[1]["content"][0]["tool_use_id"], "toolu_42");
        assert_eq!(spec[1]["content"][0]["content"], "51.2N, 4.4E");
    }

    #[test]
    fn test_usage_defaults_to_zero() {
        let config = AnthropicProviderConfig {
            host: "http://localhost".to_string(),
            api_key: "test_api_key".to_string(),
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 4096,
        };
        let provider = AnthropicProvider::new(config).unwrap();

        assert_eq!(provider.get_usage(&json!({})), Usage::default());
        assert_eq!(
            provider.get_usage(&json!({"usage": {"input_tokens": 7}})),
            Usage::new(7, 0)
        );
    }
}
