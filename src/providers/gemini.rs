use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;

use super::base::{Provider, Usage};
use super::configs::GeminiProviderConfig;
use super::utils::{
    google_build_payload, google_extract_text, google_format_assistant_message, google_get_usage,
    google_is_complete, google_parse_tool_calls, tool_result_fragment,
};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

pub const GEMINI_TEMPERATURE: f32 = 0.7;

/// Adapter for the Gemini Developer API. The wire translation is shared with
/// the Vertex adapter; only the endpoint, credential, and id prefix differ.
pub struct GeminiProvider {
    client: Client,
    config: GeminiProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: GeminiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.host.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
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
impl Provider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[Tool],
        system_prompt: &str,
    ) -> Result<Value> {
        let payload = google_build_payload(messages, tools, system_prompt, GEMINI_TEMPERATURE);
        self.post(payload).await
    }

    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall> {
        google_parse_tool_calls(response, "gemini_tool")
    }

    fn format_tool_result(&self, call_id: &str, tool_name: &str, content: &str) -> Value {
        tool_result_fragment(call_id, tool_name, content)
    }

    fn is_complete(&self, response: &Value) -> bool {
        google_is_complete(response)
    }

    fn extract_final_response(&self, response: &Value) -> String {
        google_extract_text(response)
    }

    fn format_assistant_message(&self, response: &Value) -> Message {
        google_format_assistant_message(response)
    }

    fn get_usage(&self, response: &Value) -> Usage {
        google_get_usage(response)
    }
}
