use std::env;

use crate::errors::{ConfigError, ConfigResult};

// Default vendor endpoints; each is overridable through its *_HOST variable
// so tests can point an adapter at a local server.
pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const OPENAI_HOST: &str = "https://api.openai.com";
pub const GEMINI_HOST: &str = "https://generativelanguage.googleapis.com";
pub const VERTEX_HOST: &str = "https://aiplatform.googleapis.com";

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";

pub const ANTHROPIC_MAX_TOKENS: u32 = 4096;
pub const OPENAI_MAX_TOKENS: u32 = 4096;

/// Model type to model name mapping for the managed-platform variant
pub const VERTEX_MODEL_MAP: &[(&str, &str)] = &[("gemini", "gemini-3-flash-preview")];
pub const DEFAULT_VERTEX_MODEL_TYPE: &str = "gemini";

// Unified enum to wrap different provider configurations
pub enum ProviderConfig {
    Anthropic(AnthropicProviderConfig),
    OpenAi(OpenAiProviderConfig),
    OpenAiResponses(OpenAiProviderConfig),
    Gemini(GeminiProviderConfig),
    Vertex(VertexProviderConfig),
}

#[derive(Debug)]
pub struct AnthropicProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl AnthropicProviderConfig {
    pub fn from_env(model: Option<&str>) -> ConfigResult<Self> {
        Ok(Self {
            host: env_or("ANTHROPIC_HOST", ANTHROPIC_HOST),
            api_key: required_env("ANTHROPIC_API_KEY", "anthropic")?,
            model: resolve_model(model, "ANTHROPIC_MODEL", DEFAULT_ANTHROPIC_MODEL),
            max_tokens: ANTHROPIC_MAX_TOKENS,
        })
    }
}

pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl OpenAiProviderConfig {
    pub fn from_env(model: Option<&str>) -> ConfigResult<Self> {
        Ok(Self {
            host: env_or("OPENAI_HOST", OPENAI_HOST),
            api_key: required_env("OPENAI_API_KEY", "openai")?,
            model: resolve_model(model, "OPENAI_MODEL", DEFAULT_OPENAI_MODEL),
            max_tokens: OPENAI_MAX_TOKENS,
        })
    }
}

pub struct GeminiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl GeminiProviderConfig {
    pub fn from_env(model: Option<&str>) -> ConfigResult<Self> {
        Ok(Self {
            host: env_or("GEMINI_HOST", GEMINI_HOST),
            api_key: required_env("GOOGLE_API_KEY", "gemini")?,
            model: resolve_model(model, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
        })
    }
}

#[derive(Debug)]
pub struct VertexProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
}

impl VertexProviderConfig {
    /// An explicit model override wins; otherwise the model type is resolved
    /// through the static model-type table, with the environment able to
    /// override the mapped default.
    pub fn from_env(model_type: Option<&str>, model: Option<&str>) -> ConfigResult<Self> {
        let api_key = required_env("GOOGLE_CLOUD_API_KEY", "vertex")?;
        let model = match model {
            Some(model) => model.to_string(),
            None => {
                let effective = model_type.unwrap_or(DEFAULT_VERTEX_MODEL_TYPE);
                let mapped = VERTEX_MODEL_MAP
                    .iter()
                    .find(|(model_type, _)| *model_type == effective)
                    .map(|(_, model)| *model)
                    .ok_or_else(|| ConfigError::UnknownModelType {
                        model_type: effective.to_string(),
                        known: VERTEX_MODEL_MAP
                            .iter()
                            .map(|(model_type, _)| model_type.to_string())
                            .collect(),
                    })?;
                env_or("VERTEX_MODEL", mapped)
            }
        };
        Ok(Self {
            host: env_or("VERTEX_HOST", VERTEX_HOST),
            api_key,
            model,
        })
    }
}

fn required_env(var: &'static str, provider: &'static str) -> ConfigResult<String> {
    env::var(var).map_err(|_| ConfigError::MissingEnv { var, provider })
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

fn resolve_model(overridden: Option<&str>, var: &str, default: &str) -> String {
    match overridden {
        Some(model) => model.to_string(),
        None => env_or(var, default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests in this module mutate process environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_credential_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("ANTHROPIC_API_KEY");

        let error = AnthropicProviderConfig::from_env(None).unwrap_err();
        assert_eq!(
            error,
            ConfigError::MissingEnv {
                var: "ANTHROPIC_API_KEY",
                provider: "anthropic",
            }
        );
    }

    #[test]
    fn test_model_override_wins_over_default() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("ANTHROPIC_API_KEY", "test_api_key");
        env::remove_var("ANTHROPIC_MODEL");

        let config = AnthropicProviderConfig::from_env(Some("claude-sonnet-4-5")).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-5");

        let config = AnthropicProviderConfig::from_env(None).unwrap();
        assert_eq!(config.model, DEFAULT_ANTHROPIC_MODEL);

        env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_vertex_model_type_resolution() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("GOOGLE_CLOUD_API_KEY", "test_api_key");
        env::remove_var("VERTEX_MODEL");

        let config = VertexProviderConfig::from_env(None, None).unwrap();
        assert_eq!(config.model, "gemini-3-flash-preview");

        let config = VertexProviderConfig::from_env(Some("gemini"), None).unwrap();
        assert_eq!(config.model, "gemini-3-flash-preview");

        let config = VertexProviderConfig::from_env(None, Some("gemini-4")).unwrap();
        assert_eq!(config.model, "gemini-4");

        env::remove_var("GOOGLE_CLOUD_API_KEY");
    }

    #[test]
    fn test_vertex_unknown_model_type() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("GOOGLE_CLOUD_API_KEY", "test_api_key");

        let error = VertexProviderConfig::from_env(Some("palm"), None).unwrap_err();
        match error {
            ConfigError::UnknownModelType { model_type, known } => {
                assert_eq!(model_type, "palm");
                assert_eq!(known, vec!["gemini".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        env::remove_var("GOOGLE_CLOUD_API_KEY");
    }
}
