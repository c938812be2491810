use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::agent::memory::ConversationThread;
use crate::article::{AggregatedResponse, ArticleRecord, Category, Section};
use crate::classifier::classify_in_context;
use crate::config::{parse_list, parse_optional, AppConfig};
use crate::error::{ProviderError, ProviderFailure, ValidationError};
use crate::providers::newsapi::NewsApiClient;
use crate::providers::tavily::TavilySearchClient;
use crate::providers::{NewsProvider, ProviderId};

pub const DEFAULT_SECTION_LIMIT: usize = 5;
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 8;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct AggregatorConfig {
    #[serde(rename = "section_limit", default, deserialize_with = "parse_optional")]
    pub section_limit: Option<usize>,
    #[serde(
        rename = "provider_timeout_secs",
        default,
        deserialize_with = "parse_optional"
    )]
    pub provider_timeout_secs: Option<u64>,
    #[serde(rename = "disabled_providers", default, deserialize_with = "parse_list")]
    pub disabled_providers: Option<Vec<ProviderId>>,
    #[serde(rename = "routes_general", default, deserialize_with = "parse_list")]
    pub routes_general: Option<Vec<ProviderId>>,
    #[serde(rename = "routes_technology", default, deserialize_with = "parse_list")]
    pub routes_technology: Option<Vec<ProviderId>>,
    #[serde(rename = "routes_business", default, deserialize_with = "parse_list")]
    pub routes_business: Option<Vec<ProviderId>>,
}

impl AggregatorConfig {
    pub fn section_limit(&self) -> usize {
        self.section_limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_SECTION_LIMIT)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(
            self.provider_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
        )
    }

    pub fn routing_table(&self) -> RoutingTable {
        let mut table = RoutingTable::default();
        let overrides = [
            (Category::General, &self.routes_general),
            (Category::Technology, &self.routes_technology),
            (Category::Business, &self.routes_business),
        ];
        for (category, route) in overrides {
            if let Some(route) = route {
                table = table.with_route(category, route.clone());
            }
        }
        table
    }
}

/// Which providers serve which query category, in merge order.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingTable {
    general: Vec<ProviderId>,
    technology: Vec<ProviderId>,
    business: Vec<ProviderId>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        use ProviderId::*;
        Self {
            general: vec![WebSearch, NewsApi, Linkedin, Medium],
            technology: vec![TechNews, WebSearch, NewsApi, Linkedin, Medium],
            business: vec![BusinessNews, WebSearch, NewsApi, Linkedin, Medium],
        }
    }
}

impl RoutingTable {
    pub fn empty() -> Self {
        Self {
            general: Vec::new(),
            technology: Vec::new(),
            business: Vec::new(),
        }
    }

    /// Replaces the route for `category`, dropping repeated ids.
    pub fn with_route(mut self, category: Category, route: Vec<ProviderId>) -> Self {
        let mut seen = HashSet::new();
        let route: Vec<ProviderId> = route.into_iter().filter(|id| seen.insert(*id)).collect();
        match category {
            Category::Technology => self.technology = route,
            Category::Business => self.business = route,
            Category::General | Category::Professional => self.general = route,
        }
        self
    }

    pub fn providers_for(&self, category: Category) -> &[ProviderId] {
        match category {
            Category::Technology => &self.technology,
            Category::Business => &self.business,
            Category::General | Category::Professional => &self.general,
        }
    }
}

/// Fans a query out to the providers routed for its category and merges the
/// results into one response. Provider failures never escape: they become
/// warnings on the response.
pub struct Aggregator {
    providers: HashMap<ProviderId, Arc<dyn NewsProvider>>,
    unavailable: HashMap<ProviderId, String>,
    routes: RoutingTable,
    section_limit: usize,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(routes: RoutingTable, section_limit: usize, timeout: Duration) -> Self {
        Self {
            providers: HashMap::new(),
            unavailable: HashMap::new(),
            routes,
            section_limit: section_limit.max(1),
            timeout,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn NewsProvider>) -> Self {
        let id = provider.id();
        self.unavailable.remove(&id);
        self.providers.insert(id, provider);
        self
    }

    pub fn with_unavailable(mut self, id: ProviderId, reason: impl Into<String>) -> Self {
        self.providers.remove(&id);
        self.unavailable.insert(id, reason.into());
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = config.aggregator.provider_timeout();
        let mut aggregator = Self::new(
            config.aggregator.routing_table(),
            config.aggregator.section_limit(),
            timeout,
        );

        let news = config.news_api.provider_config();
        let tavily = config.tavily.provider_config();
        let built: Vec<Result<Arc<dyn NewsProvider>, ProviderError>> = vec![
            NewsApiClient::general(&news, timeout).map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
            NewsApiClient::technology(&news, timeout).map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
            NewsApiClient::business(&news, timeout).map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
            TavilySearchClient::web(&tavily, timeout).map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
            TavilySearchClient::linkedin(&tavily, timeout)
                .map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
            TavilySearchClient::medium(&tavily, timeout)
                .map(|c| Arc::new(c) as Arc<dyn NewsProvider>),
        ];

        for result in built {
            aggregator = match result {
                Ok(provider) => aggregator.with_provider(provider),
                Err(err) => {
                    log::warn!("provider {} unavailable: {}", err.provider, err.reason);
                    let reason = match err.reason {
                        ProviderFailure::Disabled(reason) => reason,
                        other => other.to_string(),
                    };
                    aggregator.with_unavailable(err.provider, reason)
                }
            };
        }

        for id in config.aggregator.disabled_providers.iter().flatten() {
            aggregator = aggregator.with_unavailable(*id, "disabled by configuration");
        }

        aggregator
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.routes
    }

    pub fn section_limit(&self) -> usize {
        self.section_limit
    }

    /// Classifies `query` (using the thread for follow-ups) and aggregates it.
    pub async fn aggregate(
        &self,
        query: &str,
        thread: Option<&ConversationThread>,
    ) -> Result<AggregatedResponse, ValidationError> {
        if query.trim().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        let category = classify_in_context(query, thread);
        self.aggregate_category(query, category).await
    }

    pub async fn aggregate_category(
        &self,
        query: &str,
        category: Category,
    ) -> Result<AggregatedResponse, ValidationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::EmptyQuery);
        }

        let mut response = AggregatedResponse::empty(query, category);
        if self.routes.providers_for(category).is_empty() {
            log::warn!("no providers routed for {} queries", category);
            response
                .warnings
                .push(format!("No providers are routed for {} queries", category));
        }
        let mut active: Vec<Arc<dyn NewsProvider>> = Vec::new();
        for id in self.routes.providers_for(category) {
            match self.providers.get(id) {
                Some(provider) => active.push(Arc::clone(provider)),
                None => {
                    let reason = self
                        .unavailable
                        .get(id)
                        .cloned()
                        .unwrap_or_else(|| "not configured".to_string());
                    log::warn!("skipping provider {}: {}", id, reason);
                    let skipped = ProviderError::new(*id, ProviderFailure::Disabled(reason));
                    response.warnings.push(skipped.to_string());
                }
            }
        }

        log::info!(
            "aggregating '{}' ({}) across {} providers",
            query,
            category,
            active.len()
        );

        let fetch_limit = self.section_limit * 2;
        let outcomes = join_all(
            active
                .iter()
                .map(|provider| self.fetch_one(provider.as_ref(), query, category, fetch_limit)),
        )
        .await;

        let mut seen: HashSet<String> = HashSet::new();
        for (provider, outcome) in active.iter().zip(outcomes) {
            match outcome {
                Ok(articles) => {
                    let kept = self.take_unique(articles, &mut seen);
                    if !kept.is_empty() {
                        response.sections.push(Section {
                            name: provider.id().section().to_string(),
                            articles: kept,
                        });
                    }
                }
                Err(err) => {
                    log::warn!("{}", err);
                    response.warnings.push(err.to_string());
                }
            }
        }

        if response.is_empty() {
            response.note = Some(format!("No articles found for '{}'", query));
        }
        response.generated_at = Utc::now();
        Ok(response)
    }

    async fn fetch_one(
        &self,
        provider: &dyn NewsProvider,
        query: &str,
        category: Category,
        limit: usize,
    ) -> Result<Vec<ArticleRecord>, ProviderError> {
        match tokio::time::timeout(self.timeout, provider.fetch(query, category, limit)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::new(
                provider.id(),
                ProviderFailure::Timeout(self.timeout),
            )),
        }
    }

    /// First-seen wins across the whole response; a URL only counts as seen
    /// once it has actually been placed in a section.
    fn take_unique(
        &self,
        articles: Vec<ArticleRecord>,
        seen: &mut HashSet<String>,
    ) -> Vec<ArticleRecord> {
        let mut kept = Vec::new();
        for article in articles {
            if kept.len() >= self.section_limit {
                break;
            }
            let key = article.url.trim().to_string();
            if key.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.insert(key);
            kept.push(article);
        }
        kept
    }
}
