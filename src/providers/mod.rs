pub mod newsapi;
pub mod tavily;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::article::{ArticleRecord, Category};
use crate::error::ProviderError;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    NewsApi,
    TechNews,
    BusinessNews,
    WebSearch,
    Linkedin,
    Medium,
}

impl ProviderId {
    pub const ALL: [ProviderId; 6] = [
        ProviderId::NewsApi,
        ProviderId::TechNews,
        ProviderId::BusinessNews,
        ProviderId::WebSearch,
        ProviderId::Linkedin,
        ProviderId::Medium,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::NewsApi => "news_api",
            ProviderId::TechNews => "tech_news",
            ProviderId::BusinessNews => "business_news",
            ProviderId::WebSearch => "web_search",
            ProviderId::Linkedin => "linkedin",
            ProviderId::Medium => "medium",
        }
    }

    /// Name of the response section this provider's articles land in.
    pub fn section(&self) -> &'static str {
        match self {
            ProviderId::NewsApi => "news_api",
            ProviderId::TechNews => "tech_sources",
            ProviderId::BusinessNews => "financial_sources",
            ProviderId::WebSearch => "web_search",
            ProviderId::Linkedin => "linkedin_insights",
            ProviderId::Medium => "medium_articles",
        }
    }

    /// Category stamped on articles from this provider for a query of `query_category`.
    pub fn article_category(&self, query_category: Category) -> Category {
        match self {
            ProviderId::TechNews => Category::Technology,
            ProviderId::BusinessNews => Category::Business,
            ProviderId::Linkedin | ProviderId::Medium => Category::Professional,
            ProviderId::NewsApi | ProviderId::WebSearch => query_category,
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown provider '{}'", value))
    }
}

/// One external search API, already bound to its credentials.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch(
        &self,
        query: &str,
        category: Category,
        limit: usize,
    ) -> Result<Vec<ArticleRecord>, ProviderError>;
}

/// Connection settings shared by every provider backed by one API.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub enabled: bool,
}

impl ProviderConfig {
    /// The usable key, or the reason the provider has to be skipped.
    pub fn credential(&self, var: &str) -> Result<&str, String> {
        if !self.enabled {
            return Err("disabled by configuration".to_string());
        }
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| format!("{} is not set", var))
    }
}
