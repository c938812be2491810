use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{NewsProvider, ProviderConfig, ProviderId};
use crate::article::{truncate_chars, ArticleRecord, Category};
use crate::config::parse_optional;
use crate::error::{ProviderError, ProviderFailure};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";
pub const API_KEY_VAR: &str = "NEWSROOM_NEWS_API_KEY";

pub const TECH_DOMAINS: &[&str] = &[
    "techcrunch.com",
    "arstechnica.com",
    "theverge.com",
    "wired.com",
    "engadget.com",
    "venturebeat.com",
];

pub const BUSINESS_DOMAINS: &[&str] = &[
    "bloomberg.com",
    "reuters.com",
    "cnbc.com",
    "wsj.com",
    "ft.com",
    "marketwatch.com",
];

const MAX_SUMMARY_CHARS: usize = 400;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct NewsApiConfig {
    #[serde(rename = "news_api_key")]
    pub api_key: Option<String>,
    #[serde(rename = "news_api_base_url")]
    pub base_url: Option<String>,
    #[serde(rename = "news_api_enabled", default, deserialize_with = "parse_optional")]
    pub enabled: Option<bool>,
}

impl NewsApiConfig {
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            api_key: self.api_key.clone(),
            base_url: self
                .base_url
                .clone()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            enabled: self.enabled.unwrap_or(true),
        }
    }
}

/// Client for the `/v2/everything` endpoint, optionally pinned to a domain list.
#[derive(Debug, Clone)]
pub struct NewsApiClient {
    id: ProviderId,
    domains: Option<&'static [&'static str]>,
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl NewsApiClient {
    /// Unrestricted search across every outlet the API indexes.
    pub fn general(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(ProviderId::NewsApi, None, config, timeout)
    }

    pub fn technology(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(ProviderId::TechNews, Some(TECH_DOMAINS), config, timeout)
    }

    pub fn business(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(
            ProviderId::BusinessNews,
            Some(BUSINESS_DOMAINS),
            config,
            timeout,
        )
    }

    fn build(
        id: ProviderId,
        domains: Option<&'static [&'static str]>,
        config: &ProviderConfig,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = config
            .credential(API_KEY_VAR)
            .map_err(|reason| ProviderError::new(id, ProviderFailure::Disabled(reason)))?
            .to_string();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("newsroom/0.1")
            .build()
            .map_err(|err| ProviderError::from_reqwest(id, err, timeout))?;
        Ok(Self {
            id,
            domains,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    fn request_url(&self, query: &str, limit: usize) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/v2/everything", self.base_url)).map_err(|err| {
            ProviderError::new(
                self.id,
                ProviderFailure::Transport(format!("invalid base URL: {err}")),
            )
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("language", "en")
                .append_pair("sortBy", "publishedAt")
                .append_pair("pageSize", &limit.clamp(1, 100).to_string());
            if let Some(domains) = self.domains {
                pairs.append_pair("domains", &domains.join(","));
            }
        }
        Ok(url)
    }
}

#[derive(Deserialize, Debug)]
struct EverythingResponse {
    status: String,
    #[serde(default)]
    articles: Vec<RawArticle>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    #[serde(default)]
    source: Option<RawSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawSource {
    name: Option<String>,
}

#[async_trait]
impl NewsProvider for NewsApiClient {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn fetch(
        &self,
        query: &str,
        category: Category,
        limit: usize,
    ) -> Result<Vec<ArticleRecord>, ProviderError> {
        log::info!("searching {} for '{}'...", self.id, query);
        let url = self.request_url(query, limit)?;

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(self.id, err, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::from_reqwest(self.id, err, self.timeout))?;

        let parsed = serde_json::from_str::<EverythingResponse>(&body);
        if !status.is_success() {
            let reason = match parsed {
                Ok(EverythingResponse {
                    message: Some(message),
                    ..
                }) => ProviderFailure::Api(message),
                _ => ProviderFailure::Status {
                    status: status.as_u16(),
                    body,
                },
            };
            return Err(ProviderError::new(self.id, reason));
        }

        let parsed = parsed
            .map_err(|err| ProviderError::new(self.id, ProviderFailure::Decode(err.to_string())))?;
        if parsed.status != "ok" {
            let message = parsed
                .message
                .unwrap_or_else(|| format!("status '{}'", parsed.status));
            return Err(ProviderError::new(self.id, ProviderFailure::Api(message)));
        }

        let article_category = self.id.article_category(category);
        let articles = parsed
            .articles
            .into_iter()
            .filter_map(|raw| normalize(raw, article_category))
            .take(limit)
            .collect::<Vec<_>>();
        log::debug!("{} returned {} articles", self.id, articles.len());
        Ok(articles)
    }
}

fn normalize(raw: RawArticle, category: Category) -> Option<ArticleRecord> {
    let title = raw.title.map(|t| t.trim().to_string())?;
    if title.is_empty() || title == "[Removed]" {
        return None;
    }
    let url = raw.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
    let published_at = raw
        .published_at
        .as_deref()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Some(ArticleRecord {
        title,
        summary: truncate_chars(
            raw.description.as_deref().unwrap_or_default().trim(),
            MAX_SUMMARY_CHARS,
        ),
        source: raw
            .source
            .and_then(|s| s.name)
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        url,
        published_at,
        category,
    })
}
