use thiserror::Error;

/// Errors that indicate a caller or environment mistake rather than a
/// transient failure. These surface verbatim to the caller; anything else
/// propagates as a plain failure out of the loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown provider: {name}. Available: {known:?}")]
    UnknownProvider { name: String, known: Vec<String> },

    #[error("{var} environment variable is required for the {provider} provider")]
    MissingEnv {
        var: &'static str,
        provider: &'static str,
    },

    #[error("Unknown model type: {model_type}. Available: {known:?}")]
    UnknownModelType {
        model_type: String,
        known: Vec<String>,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
