use anyhow::Result;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pilot::agent::{Agent, AgentRequest, MetaSelection};
use pilot::errors::ConfigError;
use pilot::models::tool::{Tool, ToolCatalog};
use pilot::providers::configs::{AnthropicProviderConfig, ProviderConfig};
use pilot::providers::factory::{self, ProviderType};

fn weather_catalog() -> ToolCatalog {
    let mut catalog = ToolCatalog::new();
    catalog.register(
        Tool::new(
            "get_weather",
            "Gets the current weather for coordinates",
            json!({
                "type": "object",
                "properties": {
                    "latitude": {"type": "number"},
                    "longitude": {"type": "number"}
                },
                "required": ["latitude", "longitude"]
            }),
        ),
        |_args| Box::pin(async move { Ok("12C, cloudy".to_string()) }),
    );
    catalog
}

/// Drive the full loop against a scripted Anthropic endpoint: one tool turn,
/// then a final answer. Verifies the tool-call id survives the round trip
/// back to the vendor.
#[tokio::test]
async fn test_loop_round_trip_over_anthropic() -> Result<()> {
    let mock_server = MockServer::start().await;

    let tool_turn = json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{
            "type": "tool_use",
            "id": "toolu_01",
            "name": "get_weather",
            "input": { "latitude": 48.85, "longitude": 2.35 }
        }],
        "stop_reason": "tool_use",
        "usage": { "input_tokens": 25, "output_tokens": 10 }
    });

    let final_turn = json!({
        "id": "msg_2",
        "type": "message",
        "role": "assistant",
        "content": [{
            "type": "text",
            "text": "{\"location\": \"Paris\", \"temperature\": 12}"
        }],
        "stop_reason": "end_turn",
        "usage": { "input_tokens": 40, "output_tokens": 12 }
    });

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_turn))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(final_turn))
        .mount(&mock_server)
        .await;

    let provider = factory::get_provider_from_config(ProviderConfig::Anthropic(
        AnthropicProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "claude-haiku-4-5".to_string(),
            max_tokens: 4096,
        },
    ))?;

    let agent = Agent::with_provider(
        provider,
        "anthropic",
        weather_catalog(),
        "You are a weather service.",
    );

    let request = AgentRequest {
        request: "Weather in Paris?".to_string(),
        meta: Some(MetaSelection::All(true)),
        ..Default::default()
    };
    let result = agent.process_request(&request).await?;

    assert_eq!(
        result.data,
        json!({"location": "Paris", "temperature": 12})
    );

    let meta = result.meta.unwrap();
    assert_eq!(meta["model"], "claude-haiku-4-5");
    assert_eq!(meta["provider"], "anthropic");
    assert_eq!(meta["iterations"], 2);
    assert_eq!(meta["usage"], json!({"input_tokens": 65, "output_tokens": 22}));
    assert_eq!(meta["tools_used"], json!(["get_weather"]));

    // The second vendor call must replay the assistant tool_use stub and a
    // tool_result correlated to it, in order
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let second_body: Value = serde_json::from_slice(&requests[1].body)?;
    let messages = second_body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"][0]["type"], "tool_use");
    assert_eq!(messages[1]["content"][0]["id"], "toolu_01");
    assert_eq!(messages[2]["role"], "user");
    assert_eq!(messages[2]["content"][0]["type"], "tool_result");
    assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_01");
    assert_eq!(messages[2]["content"][0]["content"], "12C, cloudy");

    Ok(())
}

#[test]
fn test_unknown_provider_is_a_config_error() {
    let error = factory::get_provider(Some("bogus"), None, None).err().unwrap();

    let config_error = error
        .downcast_ref::<ConfigError>()
        .expect("expected a ConfigError");
    assert!(matches!(
        config_error,
        ConfigError::UnknownProvider { name, .. } if name == "bogus"
    ));

    let message = error.to_string();
    for name in ["anthropic", "openai", "openai_responses", "gemini", "vertex"] {
        assert!(message.contains(name), "missing {name} in: {message}");
    }
}

#[test]
fn test_provider_resolution_precedence() {
    // Explicit name wins over the model table
    assert_eq!(
        factory::resolve_provider_type(Some("vertex"), Some("gpt-5-mini")).unwrap(),
        ProviderType::Vertex
    );
    // Model table used when no name is given
    assert_eq!(
        factory::resolve_provider_type(None, Some("gpt-5-mini")).unwrap(),
        ProviderType::Openai
    );
}

#[test]
fn test_factory_builds_with_model_override() {
    std::env::set_var("ANTHROPIC_API_KEY", "test_api_key");

    let provider = factory::get_provider(Some("anthropic"), None, Some("claude-sonnet-4-5"))
        .expect("provider should build");
    assert_eq!(provider.model_name(), "claude-sonnet-4-5");
    assert_eq!(provider.pricing().input_per_million, 3.00);

    std::env::remove_var("ANTHROPIC_API_KEY");
}
