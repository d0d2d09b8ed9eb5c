use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool, unique within one conversation's tool set
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// JSON schema for the arguments the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// A vendor-emitted request to invoke a named tool. The id is scoped to the
/// response that produced it and is only correlated within that turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new<I, N>(id: I, name: N, arguments: Value) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Async tool implementation: arguments in, string payload out. A failure is
/// a string too; the loop folds either outcome into the tool result so the
/// model can see and react to it.
pub type ToolFunction =
    Box<dyn Fn(Value) -> BoxFuture<'static, Result<String, String>> + Send + Sync>;

/// External catalog mapping tool names to declarations and implementations.
/// The loop passes the declarations verbatim to the adapter and resolves
/// names through it; tool internals are never inspected.
#[derive(Default)]
pub struct ToolCatalog {
    tools: Vec<Tool>,
    functions: HashMap<String, ToolFunction>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool declaration together with its implementation
    pub fn register<F>(&mut self, tool: Tool, function: F)
    where
        F: Fn(Value) -> BoxFuture<'static, Result<String, String>> + Send + Sync + 'static,
    {
        self.functions.insert(tool.name.clone(), Box::new(function));
        self.tools.push(tool);
    }

    /// Declarations for the adapter, in registration order
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Look up the implementation for a tool-call name
    pub fn resolve(&self, name: &str) -> Option<&ToolFunction> {
        self.functions.get(name)
    }
}
