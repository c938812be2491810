use std::time::Duration;

use crate::providers::ProviderId;

/// Bad or empty input, rejected before any provider is contacted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Question must not be empty")]
    EmptyQuery,
    #[error("Unknown category: {0}")]
    UnknownCategory(String),
    #[error("Model provider '{0}' is not configured")]
    ModelProviderUnavailable(String),
    #[error("Unsupported language '{language}'. Supported languages: {supported}")]
    UnsupportedLanguage { language: String, supported: String },
    #[error("Audio file not found at {0}")]
    AudioNotFound(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderFailure {
    #[error("disabled: {0}")]
    Disabled(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("API error: {0}")]
    Api(String),
    #[error("unreadable response: {0}")]
    Decode(String),
}

/// A single provider failed. Always isolated by the aggregator and turned into
/// a warning on the response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{provider} {reason}")]
pub struct ProviderError {
    pub provider: ProviderId,
    pub reason: ProviderFailure,
}

impl ProviderError {
    pub fn new(provider: ProviderId, reason: ProviderFailure) -> Self {
        Self { provider, reason }
    }

    /// `timeout` is the bound the client was built with, reported when the
    /// client rather than the aggregator gives up first.
    pub fn from_reqwest(provider: ProviderId, err: reqwest::Error, timeout: Duration) -> Self {
        let reason = if err.is_timeout() {
            ProviderFailure::Timeout(timeout)
        } else if err.is_decode() {
            ProviderFailure::Decode(err.to_string())
        } else {
            ProviderFailure::Transport(err.to_string())
        };
        Self { provider, reason }
    }
}

/// Fatal to the current conversational turn. The thread is left untouched so
/// the caller can retry.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Language model call failed: {0}")]
    Llm(#[from] crate::agent::llm::LlmError),
    #[error("Language model produced no answer after {rounds} tool rounds")]
    ToolLoopExhausted { rounds: usize },
}

impl OrchestrationError {
    pub fn user_message(&self) -> &'static str {
        "The assistant could not complete this request. Please try again."
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
}

/// Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required credential {var} for LLM provider '{provider}'")]
    MissingCredential { provider: String, var: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Env(#[from] envy::Error),
}
