use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::pricing::{self, PricingRate};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

/// Token usage for one vendor call, accumulated across loop iterations.
/// Fields a vendor does not report read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn add(&mut self, other: Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Base trait for AI providers (Anthropic, OpenAI, Gemini, etc)
///
/// A vendor response is the raw JSON body returned by the vendor API. The
/// loop treats it as opaque and only inspects it through these methods.
#[async_trait]
pub trait Provider: Send + Sync {
    /// The concrete model identifier in use
    fn model_name(&self) -> &str;

    /// Pricing per million tokens for the model in use
    fn pricing(&self) -> PricingRate {
        pricing::rate_for_model(self.model_name())
    }

    /// Issue one completion call with the conversation and tool declarations.
    /// The system prompt rides on whichever side channel the vendor exposes.
    async fn complete_with_tools(
        &self,
        messages: &[Message],
        tools: &[Tool],
        system_prompt: &str,
    ) -> Result<Value>;

    /// Extract zero or more tool calls; an absent tool-call section is an
    /// empty list, not an error
    fn parse_tool_calls(&self, response: &Value) -> Vec<ToolCall>;

    /// Build the conversation fragment representing one resolved tool call
    fn format_tool_result(&self, call_id: &str, tool_name: &str, content: &str) -> Value;

    /// True iff the vendor signals no further tool execution is required
    fn is_complete(&self, response: &Value) -> bool;

    /// All textual parts of the response concatenated in order, empty string
    /// if none are present
    fn extract_final_response(&self, response: &Value) -> String;

    /// Reconstruct the assistant turn for the conversation history, keeping
    /// whatever structure the same adapter needs to continue the conversation
    fn format_assistant_message(&self, response: &Value) -> Message;

    /// Token usage, zero for any field the vendor did not report
    fn get_usage(&self, response: &Value) -> Usage;
}
