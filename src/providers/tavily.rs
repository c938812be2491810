use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{NewsProvider, ProviderConfig, ProviderId};
use crate::article::{truncate_chars, ArticleRecord, Category};
use crate::config::parse_optional;
use crate::error::{ProviderError, ProviderFailure};

pub const DEFAULT_BASE_URL: &str = "https://api.tavily.com";
pub const API_KEY_VAR: &str = "NEWSROOM_TAVILY_API_KEY";

const MAX_SUMMARY_CHARS: usize = 400;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TavilyConfig {
    #[serde(rename = "tavily_api_key")]
    pub api_key: Option<String>,
    #[serde(rename = "tavily_base_url")]
    pub base_url: Option<String>,
    #[serde(rename = "tavily_enabled", default, deserialize_with = "parse_optional")]
    pub enabled: Option<bool>,
}

impl TavilyConfig {
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

/// How the user's query is rewritten before it reaches the search index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryShape {
    LatestNews,
    Site(&'static str, &'static str),
}

impl QueryShape {
    fn apply(&self, query: &str) -> String {
        match self {
            QueryShape::LatestNews => format!("latest news about {}", query),
            QueryShape::Site(site, suffix) if suffix.is_empty() => {
                format!("site:{} {}", site, query)
            }
            QueryShape::Site(site, suffix) => format!("site:{} {} {}", site, query, suffix),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TavilySearchClient {
    id: ProviderId,
    shape: QueryShape,
    max_results: usize,
    api_key: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl TavilySearchClient {
    /// General web news search.
    pub fn web(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(ProviderId::WebSearch, QueryShape::LatestNews, 10, config, timeout)
    }

    pub fn linkedin(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(
            ProviderId::Linkedin,
            QueryShape::Site("linkedin.com", "news insights"),
            5,
            config,
            timeout,
        )
    }

    pub fn medium(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Self::build(
            ProviderId::Medium,
            QueryShape::Site("medium.com", ""),
            5,
            config,
            timeout,
        )
    }

    fn build(
        id: ProviderId,
        shape: QueryShape,
        max_results: usize,
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
            shape,
            max_results,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }
}

#[derive(Serialize, Debug)]
struct SearchRequest<'a> {
    query: &'a str,
    topic: &'a str,
    max_results: usize,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum ErrorDetail {
    Message { error: String },
    Text(String),
}

#[async_trait]
impl NewsProvider for TavilySearchClient {
    fn id(&self) -> ProviderId {
        self.id
    }

    async fn fetch(
        &self,
        query: &str,
        category: Category,
        limit: usize,
    ) -> Result<Vec<ArticleRecord>, ProviderError> {
        let search_query = self.shape.apply(query);
        log::info!("searching {} for '{}'...", self.id, search_query);

        let request = SearchRequest {
            query: &search_query,
            topic: "news",
            max_results: limit.min(self.max_results).max(1),
        };
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ProviderError::from_reqwest(self.id, err, self.timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ProviderError::from_reqwest(self.id, err, self.timeout))?;

        if !status.is_success() {
            let reason = match serde_json::from_str::<ErrorBody>(&body) {
                Ok(ErrorBody {
                    detail: Some(ErrorDetail::Message { error }),
                })
                | Ok(ErrorBody {
                    detail: Some(ErrorDetail::Text(error)),
                }) => ProviderFailure::Api(error),
                _ => ProviderFailure::Status {
                    status: status.as_u16(),
                    body,
                },
            };
            return Err(ProviderError::new(self.id, reason));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|err| ProviderError::new(self.id, ProviderFailure::Decode(err.to_string())))?;

        let article_category = self.id.article_category(category);
        let articles = parsed
            .results
            .into_iter()
            .filter_map(|raw| normalize(raw, article_category))
            .take(limit)
            .collect::<Vec<_>>();
        log::debug!("{} returned {} results", self.id, articles.len());
        Ok(articles)
    }
}

fn normalize(raw: SearchResult, category: Category) -> Option<ArticleRecord> {
    let url = raw.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())?;
    let source = Url::parse(&url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "Unknown".to_string());
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title".to_string());
    Some(ArticleRecord {
        title,
        summary: truncate_chars(
            raw.content.as_deref().unwrap_or_default().trim(),
            MAX_SUMMARY_CHARS,
        ),
        source,
        url,
        published_at: raw.published_date.as_deref().and_then(parse_published),
        category,
    })
}

fn parse_published(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
