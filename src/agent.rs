use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::models::message::Message;
use crate::models::tool::{ToolCall, ToolCatalog};
use crate::providers::base::{Provider, Usage};
use crate::providers::factory;
use crate::recovery::parse_json_response;

/// Hard ceiling on loop re-entries, independent of vendor behavior
pub const MAX_ITERATIONS: usize = 10;

/// A request for the loop to resolve: free-form text plus optional hints
/// that are folded into the user message as plain instructions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentRequest {
    pub request: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub output_format: Option<OutputFormat>,
    #[serde(default)]
    pub meta: Option<MetaSelection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputFormat {
    #[serde(default)]
    pub keys: Option<Vec<String>>,
    #[serde(default)]
    pub units: Option<String>,
}

/// Which metadata fields the caller wants attached to the result: everything
/// (`true`), nothing (`false`), or a named subset.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetaSelection {
    All(bool),
    Fields(Vec<MetaField>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaField {
    Model,
    Provider,
    Iterations,
    Usage,
    Cost,
    LatencyMs,
    ToolsUsed,
    Trace,
}

impl MetaField {
    pub const ALL: [MetaField; 8] = [
        MetaField::Model,
        MetaField::Provider,
        MetaField::Iterations,
        MetaField::Usage,
        MetaField::Cost,
        MetaField::LatencyMs,
        MetaField::ToolsUsed,
        MetaField::Trace,
    ];
}

/// One executed tool call, recorded in request order
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub tool: String,
    pub arguments: Value,
    pub iteration: usize,
}

/// The caller-visible structured answer, with optional diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct LoopResult {
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

/// Drives one conversation: repeatedly calls the provider, executes any
/// requested tools through the catalog, and stops when the provider signals
/// completion or the iteration ceiling is reached. One instance owns one
/// conversation at a time; nothing is shared across requests except the
/// read-only pricing and provider tables.
pub struct Agent {
    provider: Box<dyn Provider>,
    provider_name: String,
    catalog: ToolCatalog,
    system_prompt: String,
    max_iterations: usize,
}

impl Agent {
    /// Create an agent backed by the provider resolved from the selection
    /// inputs (explicit name, model-table inference, or configured default)
    pub fn new(
        provider_name: Option<&str>,
        model_type: Option<&str>,
        model: Option<&str>,
        catalog: ToolCatalog,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        let provider_type = factory::resolve_provider_type(provider_name, model)?;
        let provider = factory::build_provider(provider_type, model_type, model)?;
        Ok(Self {
            provider,
            provider_name: provider_type.to_string(),
            catalog,
            system_prompt: system_prompt.into(),
            max_iterations: MAX_ITERATIONS,
        })
    }

    /// Create an agent around an already-constructed provider
    pub fn with_provider(
        provider: Box<dyn Provider>,
        provider_name: impl Into<String>,
        catalog: ToolCatalog,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            provider_name: provider_name.into(),
            catalog,
            system_prompt: system_prompt.into(),
            max_iterations: MAX_ITERATIONS,
        }
    }

    /// Process a request and return the structured answer.
    ///
    /// The conversation lives only for this call. Tool calls produced in one
    /// model turn are executed sequentially in the order the adapter returned
    /// them, and their results appended as a single message, before the next
    /// vendor call.
    pub async fn process_request(&self, request: &AgentRequest) -> Result<LoopResult> {
        let started = Instant::now();

        let user_message = build_user_message(request);
        let mut messages = vec![Message::user().with_text(user_message)];

        info!(request = preview(&request.request, 100), "request received");
        if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
            info!(context, "request context");
        }

        let mut usage = Usage::default();
        let mut trace: Vec<TraceEntry> = Vec::new();
        let mut iteration = 0;

        while iteration < self.max_iterations {
            iteration += 1;
            info!(iteration, "loop iteration");

            let response = self
                .provider
                .complete_with_tools(&messages, self.catalog.tools(), &self.system_prompt)
                .await?;

            usage.add(self.provider.get_usage(&response));

            if self.provider.is_complete(&response) {
                let final_text = self.provider.extract_final_response(&response);
                info!("model complete, generating response");
                let data = parse_json_response(&final_text);
                self.log_cost(usage);
                return Ok(self.finish(data, request, iteration, usage, trace, started));
            }

            let tool_calls = self.provider.parse_tool_calls(&response);

            if tool_calls.is_empty() {
                // Incomplete with nothing to execute: a further call cannot
                // make progress, so extract whatever text exists
                warn!("no tool calls in incomplete response, extracting response");
                let final_text = self.provider.extract_final_response(&response);
                let data = parse_json_response(&final_text);
                return Ok(self.finish(data, request, iteration, usage, trace, started));
            }

            messages.push(self.provider.format_assistant_message(&response));

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                info!(tool = %call.name, arguments = %call.arguments, "tool call");
                let output = self.execute_tool(call).await;
                info!(result = preview(&output, 150), "tool result");
                trace.push(TraceEntry {
                    tool: call.name.clone(),
                    arguments: call.arguments.clone(),
                    iteration,
                });
                results.push(
                    self.provider
                        .format_tool_result(&call.id, &call.name, &output),
                );
            }
            messages.push(Message::user().with_items(results));
        }

        error!("max iterations reached");
        let data = json!({ "error": "Max iterations reached", "partial_data": null });
        Ok(self.finish(data, request, self.max_iterations, usage, trace, started))
    }

    /// Run one tool call. Unknown names and failures come back as error
    /// strings so the model can see and react to them; the loop never aborts
    /// on a tool.
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let function = match self.catalog.resolve(&call.name) {
            Some(function) => function,
            None => return format!("Error: Unknown tool '{}'", call.name),
        };

        match function(call.arguments.clone()).await {
            Ok(result) => result,
            Err(error) => format!("Error executing {}: {}", call.name, error),
        }
    }

    fn finish(
        &self,
        data: Value,
        request: &AgentRequest,
        iterations: usize,
        usage: Usage,
        trace: Vec<TraceEntry>,
        started: Instant,
    ) -> LoopResult {
        let meta = request
            .meta
            .as_ref()
            .and_then(|selection| self.build_meta(selection, iterations, usage, &trace, started));
        LoopResult { data, meta }
    }

    fn build_meta(
        &self,
        selection: &MetaSelection,
        iterations: usize,
        usage: Usage,
        trace: &[TraceEntry],
        started: Instant,
    ) -> Option<Value> {
        let fields: Vec<MetaField> = match selection {
            MetaSelection::All(true) => MetaField::ALL.to_vec(),
            MetaSelection::All(false) => return None,
            MetaSelection::Fields(fields) => fields.clone(),
        };

        let rate = self.provider.pricing();
        let mut meta = serde_json::Map::new();

        for field in fields {
            match field {
                MetaField::Model => {
                    meta.insert("model".to_string(), json!(self.provider.model_name()));
                }
                MetaField::Provider => {
                    meta.insert("provider".to_string(), json!(self.provider_name));
                }
                MetaField::Iterations => {
                    meta.insert("iterations".to_string(), json!(iterations));
                }
                MetaField::Usage => {
                    meta.insert("usage".to_string(), json!(usage));
                }
                MetaField::Cost => {
                    let input =
                        round6(usage.input_tokens as f64 / 1e6 * rate.input_per_million);
                    let output =
                        round6(usage.output_tokens as f64 / 1e6 * rate.output_per_million);
                    meta.insert(
                        "cost".to_string(),
                        json!({
                            "input": input,
                            "output": output,
                            "total": round6(input + output),
                        }),
                    );
                }
                MetaField::LatencyMs => {
                    meta.insert(
                        "latency_ms".to_string(),
                        json!(started.elapsed().as_millis() as u64),
                    );
                }
                MetaField::ToolsUsed => {
                    let tools: Vec<&str> = trace.iter().map(|entry| entry.tool.as_str()).collect();
                    meta.insert("tools_used".to_string(), json!(tools));
                }
                MetaField::Trace => {
                    meta.insert("trace".to_string(), json!(trace));
                }
            }
        }

        Some(Value::Object(meta))
    }

    fn log_cost(&self, usage: Usage) {
        let rate = self.provider.pricing();
        let input_cost = usage.input_tokens as f64 / 1e6 * rate.input_per_million;
        let output_cost = usage.output_tokens as f64 / 1e6 * rate.output_per_million;

        info!(
            model = self.provider.model_name(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            cost = %format!("${:.6}", input_cost + output_cost),
            "usage"
        );
    }
}

/// Fold the request text and the optional hints into one user message; no
/// adapter has a side channel for them.
fn build_user_message(request: &AgentRequest) -> String {
    let mut parts = vec![request.request.clone()];

    if let Some(context) = request.context.as_deref().filter(|c| !c.is_empty()) {
        parts.push(format!("\nContext: {context}"));
    }

    if let Some(format) = &request.output_format {
        if let Some(keys) = &format.keys {
            parts.push(format!("\nOutput keys (use these exact names): {keys:?}"));
        }
        if let Some(units) = &format.units {
            parts.push(format!("\nUnits: {units}"));
        }
    }

    parts.concat()
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn preview(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
