use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::role::Role;

/// Content carried inside a message: plain text, or a list of vendor-opaque
/// fragments (assistant tool-call stubs, tool-result blocks). The loop
/// appends fragment lists but never interprets them; only the adapter that
/// produced a fragment knows its shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Items(Vec<Value>),
}

/// A message to or from an LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub created: i64,
    pub content: MessageContent,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Message {
            role: Role::User,
            created: Utc::now().timestamp(),
            content: MessageContent::Text(String::new()),
        }
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Message {
            role: Role::Assistant,
            created: Utc::now().timestamp(),
            content: MessageContent::Text(String::new()),
        }
    }

    /// Set plain text content
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = MessageContent::Text(text.into());
        self
    }

    /// Set vendor-opaque fragment content
    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.content = MessageContent::Items(items);
        self
    }

    /// Get the text content if this message carries plain text
    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            MessageContent::Text(text) => Some(text),
            MessageContent::Items(_) => None,
        }
    }

    /// Get the fragment list if this message carries vendor fragments
    pub fn items(&self) -> Option<&[Value]> {
        match &self.content {
            MessageContent::Text(_) => None,
            MessageContent::Items(items) => Some(items),
        }
    }
}
