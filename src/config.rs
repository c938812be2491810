use crate::agent::llm::LlmConfig;
use crate::agent::AgentConfig;
use crate::aggregator::AggregatorConfig;
use crate::error::ConfigError;
use crate::providers::newsapi::NewsApiConfig;
use crate::providers::tavily::TavilyConfig;
use crate::server::ServerConfig;
use crate::speech::SpeechConfig;
use serde::{Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

pub const ENV_PREFIX: &str = "NEWSROOM_";

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(flatten)]
    pub llm: LlmConfig,
    #[serde(flatten)]
    pub agent: AgentConfig,
    #[serde(flatten)]
    pub news_api: NewsApiConfig,
    #[serde(flatten)]
    pub tavily: TavilyConfig,
    #[serde(flatten)]
    pub aggregator: AggregatorConfig,
    #[serde(flatten)]
    pub speech: SpeechConfig,
    #[serde(flatten)]
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = envy::prefixed(ENV_PREFIX).from_env::<AppConfig>()?;
        config.llm.validate()?;
        Ok(config)
    }

    /// Optional credentials that are absent; their providers will be skipped.
    pub fn missing_optional_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.news_api.provider_config().credential("").is_err() {
            missing.push("NEWSROOM_NEWS_API_KEY");
        }
        if self.tavily.provider_config().credential("").is_err() {
            missing.push("NEWSROOM_TAVILY_API_KEY");
        }
        missing
    }
}

/// Flattened env values always arrive as strings; parse them explicitly.
pub(crate) fn parse_optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(s) => s.parse::<T>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

/// Comma separated list, blanks dropped. A missing or blank variable is `None`.
pub(crate) fn parse_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    let Some(s) = s.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.parse::<T>().map_err(serde::de::Error::custom))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}
