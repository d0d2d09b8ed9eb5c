use std::env;
use std::str::FromStr;

use anyhow::Result;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::debug;

use super::anthropic::AnthropicProvider;
use super::base::Provider;
use super::configs::{
    AnthropicProviderConfig, GeminiProviderConfig, OpenAiProviderConfig, ProviderConfig,
    VertexProviderConfig,
};
use super::gemini::GeminiProvider;
use super::openai::OpenAiProvider;
use super::openai_responses::OpenAiResponsesProvider;
use super::vertex::VertexProvider;
use crate::errors::{ConfigError, ConfigResult};

pub const DEFAULT_PROVIDER: ProviderType = ProviderType::Anthropic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ProviderType {
    Anthropic,
    Openai,
    OpenaiResponses,
    Gemini,
    Vertex,
}

/// Static model→provider table used when the caller names a model but no
/// provider
const MODEL_PROVIDERS: &[(&str, ProviderType)] = &[
    ("claude-haiku-4-5", ProviderType::Anthropic),
    ("claude-sonnet-4-5", ProviderType::Anthropic),
    ("gpt-5-mini", ProviderType::Openai),
    ("gpt-5-nano", ProviderType::Openai),
    ("gemini-3-flash-preview", ProviderType::Gemini),
];

pub fn known_providers() -> Vec<String> {
    ProviderType::iter().map(|p| p.to_string()).collect()
}

fn parse_provider_name(name: &str) -> ConfigResult<ProviderType> {
    ProviderType::from_str(name).map_err(|_| ConfigError::UnknownProvider {
        name: name.to_string(),
        known: known_providers(),
    })
}

/// Resolve which provider backs the request: an explicit name wins, then the
/// model table, then the process-wide default.
pub fn resolve_provider_type(
    provider_name: Option<&str>,
    model: Option<&str>,
) -> ConfigResult<ProviderType> {
    if let Some(name) = provider_name {
        return parse_provider_name(name);
    }

    if let Some(model) = model {
        if let Some((_, provider_type)) = MODEL_PROVIDERS.iter().find(|(name, _)| *name == model) {
            return Ok(*provider_type);
        }
    }

    match env::var("LLM_PROVIDER") {
        Ok(name) => parse_provider_name(&name),
        Err(_) => Ok(DEFAULT_PROVIDER),
    }
}

/// Construct an adapter for an already-resolved provider type. `model_type`
/// is consumed only by adapters with multiple model families; `model` is an
/// explicit override for all of them.
pub fn build_provider(
    provider_type: ProviderType,
    model_type: Option<&str>,
    model: Option<&str>,
) -> Result<Box<dyn Provider>> {
    debug!(provider = %provider_type, "constructing provider");
    let provider: Box<dyn Provider> = match provider_type {
        ProviderType::Anthropic => {
            Box::new(AnthropicProvider::new(AnthropicProviderConfig::from_env(model)?)?)
        }
        ProviderType::Openai => {
            Box::new(OpenAiProvider::new(OpenAiProviderConfig::from_env(model)?)?)
        }
        ProviderType::OpenaiResponses => Box::new(OpenAiResponsesProvider::new(
            OpenAiProviderConfig::from_env(model)?,
        )?),
        ProviderType::Gemini => {
            Box::new(GeminiProvider::new(GeminiProviderConfig::from_env(model)?)?)
        }
        ProviderType::Vertex => Box::new(VertexProvider::new(VertexProviderConfig::from_env(
            model_type, model,
        )?)?),
    };
    Ok(provider)
}

/// Factory to get an adapter from selection inputs. Unknown provider names
/// fail with the list of known names; missing credentials fail fatally.
pub fn get_provider(
    provider_name: Option<&str>,
    model_type: Option<&str>,
    model: Option<&str>,
) -> Result<Box<dyn Provider>> {
    let provider_type = resolve_provider_type(provider_name, model)?;
    build_provider(provider_type, model_type, model)
}

/// Construct an adapter from an explicit configuration, bypassing the
/// environment entirely
pub fn get_provider_from_config(config: ProviderConfig) -> Result<Box<dyn Provider>> {
    match config {
        ProviderConfig::Anthropic(config) => Ok(Box::new(AnthropicProvider::new(config)?)),
        ProviderConfig::OpenAi(config) => Ok(Box::new(OpenAiProvider::new(config)?)),
        ProviderConfig::OpenAiResponses(config) => {
            Ok(Box::new(OpenAiResponsesProvider::new(config)?))
        }
        ProviderConfig::Gemini(config) => Ok(Box::new(GeminiProvider::new(config)?)),
        ProviderConfig::Vertex(config) => Ok(Box::new(VertexProvider::new(config)?)),
    }
}
