use serde_json::{json, Value};

use super::base::Usage;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

/// Neutral tool-result fragment used by every adapter except Anthropic
/// (whose native block shape carries the result directly). Each adapter
/// re-translates the fragment into its own wire shape on the next call.
pub fn tool_result_fragment(call_id: &str, tool_name: &str, content: &str) -> Value {
    json!({
        "type": "tool_result",
        "tool_use_id": call_id,
        "tool_name": tool_name,
        "content": content,
    })
}

/// Convert tool declarations into a generateContent tools array
pub fn tools_to_google_spec(tools: &[Tool]) -> Value {
    let declarations: Vec<Value> = tools
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            })
        })
        .collect();
    json!([{ "functionDeclarations": declarations }])
}

/// Convert conversation messages into generateContent content turns.
/// Tool results become functionResponse parts correlated by tool name;
/// assistant fragments are replayed as text and functionCall parts.
pub fn messages_to_google_contents(messages: &[Message]) -> Vec<Value> {
    let mut contents = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
            // Instructions ride via systemInstruction
            Role::System => continue,
        };

        match &message.content {
            MessageContent::Text(text) => {
                contents.push(json!({
                    "role": role,
                    "parts": [{ "text": text }],
                }));
            }
            MessageContent::Items(items) => {
                let mut parts = Vec::new();
                for item in items {
                    match item.get("type").and_then(Value::as_str) {
                        Some("tool_result") => parts.push(json!({
                            "functionResponse": {
                                "name": item
                                    .get("tool_name")
                                    .and_then(Value::as_str)
                                    .unwrap_or("unknown"),
                                "response": {
                                    "result": item
                                        .get("content")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default(),
                                },
                            }
                        })),
                        Some("function_call") => parts.push(json!({
                            "functionCall": {
                                "name": item
                                    .get("name")
                                    .and_then(Value::as_str)
                                    .unwrap_or_default(),
                                "args": item.get("args").cloned().unwrap_or_else(|| json!({})),
                            }
                        })),
                        Some("text") => {
                            if let Some(text) = item.get("text").and_then(Value::as_str) {
                                parts.push(json!({ "text": text }));
                            }
                        }
                        _ => {}
                    }
                }
                if !parts.is_empty() {
                    contents.push(json!({ "role": role, "parts": parts }));
                }
            }
        }
    }

    contents
}

/// Full request payload shared by the Gemini and Vertex adapters
pub fn google_build_payload(
    messages: &[Message],
    tools: &[Tool],
    system_prompt: &str,
    temperature: f32,
) -> Value {
    let mut payload = json!({
        "contents": messages_to_google_contents(messages),
        "systemInstruction": { "parts": [{ "text": system_prompt }] },
        "generationConfig": { "temperature": temperature },
    });

    if !tools.is_empty() {
        let object = payload.as_object_mut().unwrap();
        object.insert("tools".to_string(), tools_to_google_spec(tools));
        object.insert(
            "toolConfig".to_string(),
            json!({ "functionCallingConfig": { "mode": "AUTO" } }),
        );
    }

    payload
}

fn candidate_parts(response: &Value) -> Option<&Vec<Value>> {
    response
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()
}

/// Function-call parts become tool calls with ids synthesized from the part
/// index; correlation back to the vendor happens by function name.
pub fn google_parse_tool_calls(response: &Value, id_prefix: &str) -> Vec<ToolCall> {
    let mut tool_calls = Vec::new();

    let parts = match candidate_parts(response) {
        Some(parts) => parts,
        None => return tool_calls,
    };

    for (index, part) in parts.iter().enumerate() {
        if let Some(call) = part.get("functionCall") {
            tool_calls.push(ToolCall::new(
                format!("{id_prefix}_{index}"),
                call.get("name").and_then(Value::as_str).unwrap_or_default(),
                call.get("args").cloned().unwrap_or_else(|| json!({})),
            ));
        }
    }

    tool_calls
}

/// Function calls are checked before any stop signal: a candidate carrying
/// pending calls is never complete, whatever the finish reason says.
pub fn google_is_complete(response: &Value) -> bool {
    match candidate_parts(response) {
        Some(parts) => !parts.iter().any(|part| part.get("functionCall").is_some()),
        None => true,
    }
}

pub fn google_extract_text(response: &Value) -> String {
    match candidate_parts(response) {
        Some(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .collect(),
        None => String::new(),
    }
}

pub fn google_format_assistant_message(response: &Value) -> Message {
    let mut items = Vec::new();

    if let Some(parts) = candidate_parts(response) {
        for part in parts {
            if let Some(text) = part.get("text").and_then(Value::as_str) {
                items.push(json!({ "type": "text", "text": text }));
            } else if let Some(call) = part.get("functionCall") {
                items.push(json!({
                    "type": "function_call",
                    "name": call.get("name").and_then(Value::as_str).unwrap_or_default(),
                    "args": call.get("args").cloned().unwrap_or_else(|| json!({})),
                }));
            }
        }
    }

    Message::assistant().with_items(items)
}

pub fn google_get_usage(response: &Value) -> Usage {
    let metadata = response.get("usageMetadata");
    let read = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    Usage::new(read("promptTokenCount"), read("candidatesTokenCount"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google_response(parts: Value) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": parts },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5 }
        })
    }

    #[test]
    fn test_messages_to_google_contents_text() {
        let messages = vec![Message::user().with_text("Hello")];
        let contents = messages_to_google_contents(&messages);

        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_messages_to_google_contents_maps_assistant_to_model() {
        let messages = vec![Message::assistant().with_text("Hi there")];
        let contents = messages_to_google_contents(&messages);

        assert_eq!(contents[0]["role"], "model");
    }

    #[test]
    fn test_messages_to_google_contents_tool_round_trip() {
        let messages = vec![
            Message::user().with_text("Weather in Paris?"),
            Message::assistant().with_items(vec![json!({
                "type": "function_call",
                "name": "get_weather",
                "args": {"city": "Paris"}
            })]),
            Message::user().with_items(vec![tool_result_fragment(
                "gemini_tool_0",
                "get_weather",
                "12C, cloudy",
            )]),
        ];

        let contents = messages_to_google_contents(&messages);
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["name"],
            "get_weather"
        );
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["name"],
            "get_weather"
        );
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["response"]["result"],
            "12C, cloudy"
        );
    }

    #[test]
    fn test_tools_to_google_spec() {
        let tool = Tool::new(
            "get_weather",
            "Gets the weather",
            json!({"type": "object", "properties": {}}),
        );
        let spec = tools_to_google_spec(&[tool]);

        assert_eq!(spec[0]["functionDeclarations"][0]["name"], "get_weather");
        assert_eq!(
            spec[0]["functionDeclarations"][0]["parameters"]["type"],
            "object"
        );
    }

    #[test]
    fn test_parse_tool_calls_synthesizes_indexed_ids() {
        let response = google_response(json!([
            { "functionCall": { "name": "geocode", "args": {"query": "Paris"} } },
            { "text": "thinking" },
            { "functionCall": { "name": "get_weather", "args": {} } }
        ]));

        let calls = google_parse_tool_calls(&response, "gemini_tool");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "gemini_tool_0");
        assert_eq!(calls[0].name, "geocode");
        assert_eq!(calls[0].arguments, json!({"query": "Paris"}));
        assert_eq!(calls[1].id, "gemini_tool_2");
    }

    #[test]
    fn test_is_complete_checks_function_calls_first() {
        // A finish reason is present, but a pending call means not complete
        let response = google_response(json!([
            { "functionCall": { "name": "geocode", "args": {} } }
        ]));
        assert!(!google_is_complete(&response));

        let response = google_response(json!([{ "text": "done" }]));
        assert!(google_is_complete(&response));

        assert!(google_is_complete(&json!({"candidates": []})));
    }

    #[test]
    fn test_extract_text_concatenates_parts() {
        let response = google_response(json!([
            { "text": "part one " },
            { "functionCall": { "name": "noop", "args": {} } },
            { "text": "part two" }
        ]));
        assert_eq!(google_extract_text(&response), "part one part two");
    }

    #[test]
    fn test_get_usage_defaults_to_zero() {
        let usage = google_get_usage(&json!({}));
        assert_eq!(usage, Usage::default());

        let usage = google_get_usage(&google_response(json!([])));
        assert_eq!(usage, Usage::new(10, 5));
    }
}
